use mongodb::bson::{Bson, Document};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

/// Convert a document to plain JSON for the controller.
///
/// Starts from relaxed extended JSON, then flattens the wrappers the
/// controller cannot interpret: `{"$oid": ..}` becomes the hex string,
/// `{"$numberDecimal": ..}` a plain-notation decimal string without trailing
/// zeros and `{"$date": "<iso>"}` the ISO-8601 string. Dates outside the ISO
/// range keep their wrapper.
pub fn document_to_json(doc: Document) -> Value {
    flatten(Bson::Document(doc).into_relaxed_extjson())
}

fn flatten(value: Value) -> Value {
    match value {
        Value::Object(map) => flatten_object(map),
        Value::Array(items) => Value::Array(items.into_iter().map(flatten).collect()),
        other => other,
    }
}

fn flatten_object(map: Map<String, Value>) -> Value {
    if map.len() == 1 {
        if let Some((key, inner)) = map.iter().next() {
            match (key.as_str(), inner) {
                ("$oid", Value::String(_)) | ("$date", Value::String(_)) => {
                    return inner.clone();
                }
                ("$numberDecimal", Value::String(raw)) => {
                    return Value::String(normalize_decimal(raw));
                }
                _ => {}
            }
        }
    }
    Value::Object(map.into_iter().map(|(k, v)| (k, flatten(v))).collect())
}

/// `19.990` -> `19.99`, `1E+3` -> `1000`. Values outside the 28-digit range
/// and `NaN`/`Infinity` are passed through as the driver printed them.
fn normalize_decimal(raw: &str) -> String {
    let parsed = if raw.contains(['e', 'E']) {
        Decimal::from_scientific(raw)
    } else {
        Decimal::from_str(raw)
    };
    match parsed {
        Ok(d) => d.normalize().to_string(),
        Err(_) => raw.to_string(),
    }
}
