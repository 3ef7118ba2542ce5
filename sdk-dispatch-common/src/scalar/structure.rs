//! Coercion of strings, objects and tagged unions.

use log::warn;
use serde_json::{Map, Value};

use crate::error::{CodecError, CodecResult};

/// Require a value to be present, naming `location` in the error when given.
pub fn expect_non_null<'a>(value: &'a Value, location: Option<&str>) -> CodecResult<&'a Value> {
    if value.is_null() {
        return Err(CodecError::UnexpectedNull(
            location.unwrap_or("value").to_string(),
        ));
    }
    Ok(value)
}

/// Coerce a value to a JSON object. Arrays are rejected.
pub fn expect_object(value: &Value) -> CodecResult<Option<&Map<String, Value>>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(CodecError::type_mismatch("object", other)),
    }
}

/// Coerce a value to a string. Numbers and booleans are stringified with a warning.
pub fn expect_string(value: &Value) -> CodecResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => {
            warn!("Expected string, got number: {n}");
            Ok(Some(n.to_string()))
        }
        Value::Bool(b) => {
            warn!("Expected string, got boolean: {b}");
            Ok(Some(b.to_string()))
        }
        other => Err(CodecError::type_mismatch("string", other)),
    }
}

/// Validate a tagged union: exactly one member may be non-null.
pub fn expect_union(value: &Value) -> CodecResult<Option<&Map<String, Value>>> {
    let Some(object) = expect_object(value)? else {
        return Ok(None);
    };
    let set_keys: Vec<&str> = object
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, _)| k.as_str())
        .collect();
    match set_keys.len() {
        1 => Ok(Some(object)),
        0 => Err(CodecError::InvalidUnion("None were found.".to_string())),
        _ => Err(CodecError::InvalidUnion(format!(
            "Keys {} were not null.",
            set_keys.join(",")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expect_union_exactly_one_member() {
        let value = json!({"a": 1, "b": null});
        let union = expect_union(&value).unwrap().unwrap();
        assert_eq!(union.get("a"), Some(&json!(1)));
        assert_eq!(union.get("b"), Some(&Value::Null));
    }

    #[test]
    fn test_expect_union_rejects_empty_and_ambiguous() {
        assert_eq!(
            expect_union(&json!({"a": null, "b": null})),
            Err(CodecError::InvalidUnion("None were found.".to_string()))
        );
        assert!(matches!(
            expect_union(&json!({"a": 1, "b": 2})),
            Err(CodecError::InvalidUnion(msg)) if msg.contains("a,b")
        ));
        assert!(expect_union(&json!([1])).is_err());
        assert_eq!(expect_union(&Value::Null).unwrap(), None);
    }

    #[test]
    fn test_expect_string_lenient() {
        assert_eq!(expect_string(&json!("x")).unwrap(), Some("x".to_string()));
        assert_eq!(expect_string(&json!(12)).unwrap(), Some("12".to_string()));
        assert_eq!(expect_string(&json!(false)).unwrap(), Some("false".to_string()));
        assert!(expect_string(&json!({})).is_err());
    }

    #[test]
    fn test_expect_object_and_non_null() {
        assert!(expect_object(&json!({"k": 1})).unwrap().is_some());
        assert!(expect_object(&json!([])).is_err());
        assert_eq!(
            expect_non_null(&Value::Null, Some("Foo")),
            Err(CodecError::UnexpectedNull("Foo".to_string()))
        );
        assert_eq!(expect_non_null(&json!(1), None).unwrap(), &json!(1));
    }
}
