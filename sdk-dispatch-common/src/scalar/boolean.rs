//! Boolean coercion.

use log::warn;
use serde_json::Value;

use crate::error::{CodecError, CodecResult};

/// Parse the strict textual form of a boolean (`"true"` or `"false"`).
pub fn parse_boolean(value: &str) -> CodecResult<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(CodecError::TypeMismatch {
            expected: "boolean",
            actual: format!("\"{other}\""),
        }),
    }
}

/// Coerce a value to a boolean.
///
/// Native booleans are returned as-is. `0`/`1` and case-insensitive
/// `"true"`/`"false"` are accepted with a warning, since a conforming service
/// should never send them.
pub fn expect_boolean(value: &Value) -> CodecResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(0) => {
                warn!("Expected boolean, got number: 0");
                Ok(Some(false))
            }
            Some(1) => {
                warn!("Expected boolean, got number: 1");
                Ok(Some(true))
            }
            _ => Err(CodecError::type_mismatch("boolean", value)),
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "false" => {
                warn!("Expected boolean, got string: {s}");
                Ok(Some(false))
            }
            "true" => {
                warn!("Expected boolean, got string: {s}");
                Ok(Some(true))
            }
            _ => Err(CodecError::type_mismatch("boolean", value)),
        },
        _ => Err(CodecError::type_mismatch("boolean", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_parse_boolean() {
        assert!(parse_boolean("true").unwrap());
        assert!(!parse_boolean("false").unwrap());
        assert!(parse_boolean("TRUE").is_err());
        assert!(parse_boolean("1").is_err());
    }

    #[rstest]
    #[case(json!(true), Some(true))]
    #[case(json!(false), Some(false))]
    #[case(json!(1), Some(true))]
    #[case(json!(0), Some(false))]
    #[case(json!("True"), Some(true))]
    #[case(json!("false"), Some(false))]
    #[case(Value::Null, None)]
    fn test_expect_boolean_accepts(#[case] input: Value, #[case] expected: Option<bool>) {
        assert_eq!(expect_boolean(&input).unwrap(), expected);
    }

    #[rstest]
    #[case(json!(2))]
    #[case(json!("yes"))]
    #[case(json!({}))]
    #[case(json!([true]))]
    fn test_expect_boolean_rejects(#[case] input: Value) {
        assert!(matches!(
            expect_boolean(&input),
            Err(CodecError::TypeMismatch { expected: "boolean", .. })
        ));
    }
}
