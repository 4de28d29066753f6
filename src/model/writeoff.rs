use crate::model::Amount;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// A write-off act as returned by `/v2/documents/writeoff`.
///
/// Every field is read leniently: ids that arrive as numbers are turned into strings, `null`s
/// become defaults, and malformed items are dropped, so one odd document never sinks a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WriteoffDocument {
    #[serde(rename = "dateIncoming", deserialize_with = "lenient_string")]
    date: String,
    #[serde(rename = "documentNumber", deserialize_with = "lenient_string")]
    number: String,
    #[serde(deserialize_with = "lenient_status")]
    status: WriteoffStatus,
    #[serde(deserialize_with = "lenient_string")]
    comment: String,
    #[serde(deserialize_with = "lenient_id")]
    store_id: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    account_id: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    conception_id: Option<String>,
    #[serde(deserialize_with = "lenient_items")]
    items: Vec<WriteoffItem>,
}

impl WriteoffDocument {
    /// Reads a document from a raw payload element. Returns `None` when the element is not a
    /// keyed structure.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn status(&self) -> &WriteoffStatus {
        &self.status
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn store_id(&self) -> Option<&str> {
        self.store_id.as_deref()
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn conception_id(&self) -> Option<&str> {
        self.conception_id.as_deref()
    }

    pub fn items(&self) -> &[WriteoffItem] {
        &self.items
    }
}

/// One written-off product line.
///
/// Only `cost` is summed, so only `cost` is coerced to a number. `amount` is shown as sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WriteoffItem {
    #[serde(deserialize_with = "lenient_id")]
    product_id: Option<String>,
    #[serde(default = "zero_quantity", deserialize_with = "lenient_quantity")]
    amount: String,
    cost: Amount,
}

impl WriteoffItem {
    pub fn product_id(&self) -> Option<&str> {
        self.product_id.as_deref()
    }

    /// The quantity as it appeared in the payload, `"0"` when absent.
    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn cost(&self) -> Amount {
        self.cost
    }
}

/// The processing state of a write-off act. Codes outside the known set are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WriteoffStatus {
    New,
    Processed,
    Deleted,
    Other(String),
    #[default]
    Missing,
}

impl WriteoffStatus {
    /// The label shown in the "Проведен" column.
    pub fn label(&self) -> &str {
        match self {
            WriteoffStatus::New => "Новый",
            WriteoffStatus::Processed => "Да",
            WriteoffStatus::Deleted => "Удалённый",
            WriteoffStatus::Other(code) => code,
            WriteoffStatus::Missing => "",
        }
    }
}

impl From<String> for WriteoffStatus {
    fn from(code: String) -> Self {
        match code.as_str() {
            "NEW" => WriteoffStatus::New,
            "PROCESSED" => WriteoffStatus::Processed,
            "DELETED" => WriteoffStatus::Deleted,
            "" => WriteoffStatus::Missing,
            _ => WriteoffStatus::Other(code),
        }
    }
}

impl From<WriteoffStatus> for String {
    fn from(status: WriteoffStatus) -> Self {
        match status {
            WriteoffStatus::New => "NEW".to_string(),
            WriteoffStatus::Processed => "PROCESSED".to_string(),
            WriteoffStatus::Deleted => "DELETED".to_string(),
            WriteoffStatus::Other(code) => code,
            WriteoffStatus::Missing => String::new(),
        }
    }
}

impl Display for WriteoffStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn scalar_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_string(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_string(Value::deserialize(deserializer)?).filter(|s| !s.is_empty()))
}

fn zero_quantity() -> String {
    "0".to_string()
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_string(Value::deserialize(deserializer)?)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(zero_quantity))
}

fn lenient_status<'de, D>(deserializer: D) -> Result<WriteoffStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.into())
}

fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<WriteoffItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_full_document() {
        let doc = WriteoffDocument::from_value(&json!({
            "dateIncoming": "2024-03-05T10:15:00.000",
            "documentNumber": "WO-17",
            "status": "PROCESSED",
            "comment": "порча",
            "storeId": "store-1",
            "accountId": 501,
            "conceptionId": null,
            "items": [
                {"productId": "p-1", "amount": 2, "cost": 150.5},
                {"productId": "p-2", "amount": "0,5", "cost": null},
                "garbage"
            ]
        }))
        .unwrap();
        assert_eq!(doc.number(), "WO-17");
        assert_eq!(doc.status(), &WriteoffStatus::Processed);
        assert_eq!(doc.store_id(), Some("store-1"));
        assert_eq!(doc.account_id(), Some("501"));
        assert_eq!(doc.conception_id(), None);
        assert_eq!(doc.items().len(), 2);
        assert_eq!(doc.items()[0].amount(), "2");
        assert_eq!(doc.items()[1].amount(), "0,5");
        assert!(doc.items()[1].cost().is_zero());
    }

    #[test]
    fn test_item_amount_is_kept_as_sent() {
        let doc = WriteoffDocument::from_value(&json!({"items": [
            {"productId": "p-1", "amount": "полкило", "cost": 10},
            {"productId": "p-2", "amount": 1.25},
            {"productId": "p-3", "amount": null},
            {"productId": "p-4"}
        ]}))
        .unwrap();
        let amounts: Vec<&str> = doc.items().iter().map(WriteoffItem::amount).collect();
        assert_eq!(amounts, vec!["полкило", "1.25", "0", "0"]);
        assert_eq!(doc.items()[0].cost().to_string(), "10.00");
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(WriteoffDocument::from_value(&json!("doc")).is_none());
        assert!(WriteoffDocument::from_value(&json!([1, 2])).is_none());
        assert!(WriteoffDocument::from_value(&json!(null)).is_none());
    }

    #[test]
    fn test_from_value_empty_object() {
        let doc = WriteoffDocument::from_value(&json!({})).unwrap();
        assert_eq!(doc, WriteoffDocument::default());
    }

    #[test]
    fn test_items_not_a_list() {
        let doc = WriteoffDocument::from_value(&json!({"items": {"productId": "p"}})).unwrap();
        assert!(doc.items().is_empty());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(WriteoffStatus::from("NEW".to_string()).label(), "Новый");
        assert_eq!(WriteoffStatus::from("PROCESSED".to_string()).label(), "Да");
        assert_eq!(WriteoffStatus::from("DELETED".to_string()).label(), "Удалённый");
        assert_eq!(
            WriteoffStatus::from("ARCHIVED".to_string()).label(),
            "ARCHIVED"
        );
        assert_eq!(WriteoffStatus::default().label(), "");
    }
}
