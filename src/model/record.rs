//! A typed view over one OLAP record.
//!
//! OLAP payloads are untyped JSON objects whose keys are the preset's column names. This module
//! reads the columns the reports care about once, with explicit defaulting, so the aggregators
//! never have to poke at raw JSON.

use crate::model::{Amount, Cell};
use crate::period;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The date formats `OpenDate.Typed` has been seen in.
const OPEN_DATE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d"];

/// The OLAP column names the reports read. The defaults are the names used by the iiko presets.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RecordFields {
    pub group: String,
    pub week: String,
    pub day: String,
    pub open_date: String,
    pub category: String,
    pub category_fallback: String,
    pub total: String,
    pub guests: String,
    pub dishes: String,
    pub checks: String,
}

impl Default for RecordFields {
    fn default() -> Self {
        Self {
            group: "RestorauntGroup".to_string(),
            week: "WeekInMonthOpen".to_string(),
            day: "DayOfWeekOpen".to_string(),
            open_date: "OpenDate.Typed".to_string(),
            category: "DishCategory".to_string(),
            category_fallback: "DishGroup".to_string(),
            total: "DishDiscountSumInt".to_string(),
            guests: "GuestNum".to_string(),
            dishes: "DishAmountInt".to_string(),
            checks: "UniqOrderId".to_string(),
        }
    }
}

/// A day-of-week label such as `"2. Вторник"`: a sort number and a display name.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct DayLabel {
    number: u32,
    name: String,
}

impl DayLabel {
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
        }
    }

    /// Monday, the label used whenever a record has no usable day.
    pub fn monday() -> Self {
        Self::from_weekday_number(1)
    }

    /// Builds the localized label for an ISO weekday number (Monday = 1).
    pub fn from_weekday_number(number: u32) -> Self {
        Self::new(number, period::day_name(number))
    }

    /// Parses `"N. Name"`. A missing or non-numeric `N` sorts as 1 and a missing name becomes
    /// Monday's name, matching how the presets label days.
    pub fn parse(s: &str) -> Self {
        let mut parts = s.splitn(2, ". ");
        let number = parts
            .next()
            .and_then(|n| n.trim().parse::<u32>().ok())
            .unwrap_or(1);
        let name = parts
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| period::day_name(1).to_string());
        Self { number, name }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for DayLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}. {}", self.number, self.name)
    }
}

/// One OLAP fact row with named, optional fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticRecord {
    group: String,
    week: Option<u32>,
    day: Option<DayLabel>,
    open_date: Option<NaiveDateTime>,
    category: String,
    category_fallback: String,
    total: Cell,
    guests: Cell,
    dishes: Cell,
    checks: Cell,
}

impl AnalyticRecord {
    /// Reads a record out of a JSON object. Never fails: missing or oddly-typed fields become
    /// `None`, empty strings, or zero measures.
    pub fn from_object(object: &Map<String, Value>, fields: &RecordFields) -> Self {
        let get = |key: &str| object.get(key).filter(|v| !v.is_null());
        Self {
            group: get(&fields.group).map(text).unwrap_or_default(),
            week: get(&fields.week).and_then(week_number),
            day: get(&fields.day)
                .map(text)
                .filter(|s| !s.trim().is_empty())
                .map(|s| DayLabel::parse(&s)),
            open_date: get(&fields.open_date).and_then(|v| v.as_str()).and_then(parse_open_date),
            category: get(&fields.category).map(text).unwrap_or_default(),
            category_fallback: get(&fields.category_fallback).map(text).unwrap_or_default(),
            total: Cell::measure(get(&fields.total)),
            guests: Cell::measure(get(&fields.guests)),
            dishes: Cell::measure(get(&fields.dishes)),
            checks: Cell::measure(get(&fields.checks)),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn week(&self) -> Option<u32> {
        self.week
    }

    pub fn day(&self) -> Option<&DayLabel> {
        self.day.as_ref()
    }

    pub fn open_date(&self) -> Option<NaiveDateTime> {
        self.open_date
    }

    pub fn set_week(&mut self, week: u32) {
        self.week = Some(week);
    }

    pub fn set_day(&mut self, day: DayLabel) {
        self.day = Some(day);
    }

    /// The category, falling back to the secondary column when the primary one is blank.
    pub fn category(&self) -> &str {
        if self.category.trim().is_empty() {
            &self.category_fallback
        } else {
            &self.category
        }
    }

    /// The four ledger measures in column order: total, guests, dishes, checks.
    pub fn measures(&self) -> [Cell; 4] {
        [
            self.total.clone(),
            self.guests.clone(),
            self.dishes.clone(),
            self.checks.clone(),
        ]
    }

    /// The monetary measure as a number; text that is not a number counts as zero.
    pub fn revenue(&self) -> Amount {
        match &self.total {
            Cell::Number(amount) => *amount,
            _ => Amount::ZERO,
        }
    }
}

/// String fields are taken as-is; numbers and booleans are rendered the way JSON shows them.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A week is usable when it is a positive whole number that fits a `u32`, given either as a
/// number (`3` or `3.0`) or a string.
fn week_number(value: &Value) -> Option<u32> {
    let week = match value {
        Value::Number(n) => match n.as_u64() {
            Some(n) => u32::try_from(n).ok(),
            None => n.as_f64().and_then(whole_u32),
        },
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u32>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_u32))
        }
        _ => None,
    };
    week.filter(|w| *w > 0)
}

fn whole_u32(f: f64) -> Option<u32> {
    let whole = f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f);
    whole.then_some(f as u32)
}

fn parse_open_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    OPEN_DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt).ok().or_else(|| {
            chrono::NaiveDate::parse_from_str(s, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}
