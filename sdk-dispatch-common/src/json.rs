//! JSON document helpers.

use serde_json::{Map, Value};

/// Placeholder written in place of sensitive members when logging.
pub const SENSITIVE_STRING: &str = "***SensitiveInformation***";

/// Recursively drop `null` members and `null` list items.
///
/// A `null` document becomes an empty object, matching how document-typed
/// members are sent when the caller supplies nothing.
pub fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Null => Value::Object(Map::new()),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|item| !item.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}
