//! Flattens the envelope of an OLAP response into a sequence of records.

use crate::model::{AnalyticRecord, RecordFields};
use serde_json::Value;
use tracing::{debug, trace};

/// The keys that may hold the record array, in the order they are checked.
const RECORD_KEYS: &[&str] = &["records", "data", "report", "result"];

/// Extracts the records from a raw response.
///
/// - An array is returned unchanged.
/// - An object is searched for the first of `records`, `data`, `report`, `result` that holds an
///   array, and that array is returned.
/// - An object with none of those becomes a single-element sequence holding the object.
/// - Anything else yields an empty sequence.
pub fn normalize(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(records) => records,
        Value::Object(mut object) => {
            for key in RECORD_KEYS {
                if matches!(object.get(*key), Some(Value::Array(_))) {
                    trace!("Found records under '{key}'");
                    if let Some(Value::Array(records)) = object.remove(*key) {
                        return records;
                    }
                }
            }
            debug!("No record array found in the response, treating it as a single record");
            vec![Value::Object(object)]
        }
        _ => Vec::new(),
    }
}

/// Normalizes `payload` and reads each element through the typed record view. Elements that
/// are not objects cannot be records and are dropped.
pub fn records(payload: Value, fields: &RecordFields) -> Vec<AnalyticRecord> {
    let raw = normalize(payload);
    let total = raw.len();
    let records: Vec<AnalyticRecord> = raw
        .iter()
        .filter_map(Value::as_object)
        .map(|object| AnalyticRecord::from_object(object, fields))
        .collect();
    if records.len() < total {
        debug!(
            "Dropped {} response elements that were not objects",
            total - records.len()
        );
    }
    records
}
