//! Write-off acts joined against the reference dictionaries, one display row per act.

use crate::model::{Amount, Cell, Sheet, WriteoffDocument};
use crate::resolver::{EntityKind, ReferenceResolver};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// The formats `dateIncoming` arrives in, tried in order.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const DISPLAY_DATE_FORMAT: &str = "%d.%m.%Y %H:%M";
/// Every act is reported under the same document type.
const DOCUMENT_TYPE: &str = "P";
const HEADERS: [&str; 10] = [
    "Дата документа",
    "Тип",
    "№",
    "Товары",
    "Сумма, р.",
    "Проведен",
    "Склад",
    "Концепция",
    "Комментарий",
    "Счет списания",
];

/// Reads the acts out of a `/v2/documents/writeoff` payload. The acts live under `response`; a
/// bare array is accepted too. Elements that are not objects are skipped.
pub fn documents(payload: &Value) -> Vec<WriteoffDocument> {
    let list = match payload {
        Value::Object(object) => object.get("response").and_then(Value::as_array),
        Value::Array(list) => Some(list),
        _ => None,
    };
    let Some(list) = list else {
        debug!("Write-off payload has no document list");
        return Vec::new();
    };
    list.iter().filter_map(WriteoffDocument::from_value).collect()
}

/// One enriched act, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteoffRow {
    pub date: String,
    pub number: String,
    pub items: String,
    pub sum: Amount,
    pub status: String,
    pub store: String,
    pub conception: String,
    pub comment: String,
    pub account: String,
}

impl WriteoffRow {
    /// The ten sheet cells in column order.
    pub fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.date),
            Cell::text(DOCUMENT_TYPE),
            Cell::text(&self.number),
            Cell::text(&self.items),
            Cell::Number(self.sum),
            Cell::text(&self.status),
            Cell::text(&self.store),
            Cell::text(&self.conception),
            Cell::text(&self.comment),
            Cell::text(&self.account),
        ]
    }
}

pub fn enrich(documents: &[WriteoffDocument], resolver: &ReferenceResolver) -> Vec<WriteoffRow> {
    documents.iter().map(|doc| enrich_one(doc, resolver)).collect()
}

fn enrich_one(doc: &WriteoffDocument, resolver: &ReferenceResolver) -> WriteoffRow {
    let items = doc
        .items()
        .iter()
        .map(|item| {
            format!(
                "{} x{}",
                resolver.resolve(EntityKind::Product, item.product_id()),
                item.amount()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let sum: Amount = doc.items().iter().map(|item| item.cost()).sum();

    WriteoffRow {
        date: display_date(doc.date()),
        number: doc.number().to_string(),
        items,
        sum: sum.rounded(),
        status: doc.status().label().to_string(),
        store: resolver.resolve(EntityKind::Store, doc.store_id()).to_string(),
        conception: resolver
            .resolve(EntityKind::Conception, doc.conception_id())
            .to_string(),
        comment: doc.comment().to_string(),
        account: resolver
            .resolve(EntityKind::Account, doc.account_id())
            .to_string(),
    }
}

/// `dd.mm.yyyy HH:MM`, or the raw string when it matches none of the known formats.
fn display_date(raw: &str) -> String {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|d| d.format(DISPLAY_DATE_FORMAT).to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Title row, a blank row, the column headers, then one row per act.
pub fn to_sheet(base_name: &str, rows: &[WriteoffRow]) -> Sheet {
    let mut sheet = Sheet::new(base_name);
    sheet.push(vec![Cell::text(format!("Акты списания: {base_name}"))]);
    sheet.push_blank();
    sheet.push(HEADERS.iter().map(|h| Cell::text(*h)).collect());
    for row in rows {
        sheet.push(row.cells());
    }
    sheet
}
