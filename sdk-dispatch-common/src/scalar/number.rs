//! Integer and floating point coercion.
//!
//! Wire numbers arrive as [`serde_json::Value`]s. The `expect_*` family accepts values
//! that already carry the right JSON type, the `strict_parse_*` family additionally
//! accepts strict decimal literals held in strings, and the `limited_parse_*` family
//! accepts the `"NaN"`, `"Infinity"` and `"-Infinity"` sentinels JSON cannot encode.

use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use serde_json::{Number, Value};

use crate::error::{describe, CodecError, CodecResult};

/// Largest finite magnitude representable by an IEEE-754 binary32 float.
pub const MAX_FLOAT32: f64 = 3.402_823_466_385_288_6e38;

static NUMBER_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?(?:0|[1-9]\d*)(?:\.\d+)?(?:[eE][+-]?\d+)?)|(-?Infinity)|(NaN)")
        .expect("number literal pattern is valid")
});

static FLOAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
        .expect("float prefix pattern is valid")
});

/// Coerce a value to a double.
///
/// Numeric strings are accepted leniently: the longest numeric prefix is parsed and a
/// warning is logged when it does not reproduce the original text.
pub fn expect_number(value: &Value) -> CodecResult<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => match parse_float_prefix(s) {
            Some(parsed) => {
                if format_number(parsed) != *s {
                    warn!("Expected number but observed string: {s}");
                }
                Ok(Some(parsed))
            }
            None => Err(CodecError::type_mismatch("number", value)),
        },
        _ => Err(CodecError::type_mismatch("number", value)),
    }
}

/// Coerce a value to a double that must fit a 32-bit float.
pub fn expect_float32(value: &Value) -> CodecResult<Option<f32>> {
    expect_number(value)?.map(check_float32).transpose()
}

/// Coerce a value to a 64-bit integer. Only integral numbers are accepted.
pub fn expect_long(value: &Value) -> CodecResult<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => number_to_long(n).map(Some),
        _ => Err(CodecError::type_mismatch("integer", value)),
    }
}

/// Alias of [`expect_int32`].
pub fn expect_int(value: &Value) -> CodecResult<Option<i32>> {
    expect_int32(value)
}

pub fn expect_int32(value: &Value) -> CodecResult<Option<i32>> {
    expect_long(value)?.map(narrow::<i32>).transpose()
}

pub fn expect_short(value: &Value) -> CodecResult<Option<i16>> {
    expect_long(value)?.map(narrow::<i16>).transpose()
}

pub fn expect_byte(value: &Value) -> CodecResult<Option<i8>> {
    expect_long(value)?.map(narrow::<i8>).transpose()
}

/// Parse a double, accepting strict numeric literals in strings.
pub fn strict_parse_double(value: &Value) -> CodecResult<Option<f64>> {
    match value {
        Value::String(s) => parse_number(s).map(Some),
        other => expect_number(other),
    }
}

/// Alias of [`strict_parse_double`].
pub fn strict_parse_float(value: &Value) -> CodecResult<Option<f64>> {
    strict_parse_double(value)
}

pub fn strict_parse_float32(value: &Value) -> CodecResult<Option<f32>> {
    match value {
        Value::String(s) => check_float32(parse_number(s)?).map(Some),
        other => expect_float32(other),
    }
}

pub fn strict_parse_long(value: &Value) -> CodecResult<Option<i64>> {
    match value {
        Value::String(s) => integral(parse_number(s)?, value).map(Some),
        other => expect_long(other),
    }
}

/// Alias of [`strict_parse_int32`].
pub fn strict_parse_int(value: &Value) -> CodecResult<Option<i32>> {
    strict_parse_int32(value)
}

pub fn strict_parse_int32(value: &Value) -> CodecResult<Option<i32>> {
    strict_parse_long(value)?.map(narrow::<i32>).transpose()
}

pub fn strict_parse_short(value: &Value) -> CodecResult<Option<i16>> {
    strict_parse_long(value)?.map(narrow::<i16>).transpose()
}

pub fn strict_parse_byte(value: &Value) -> CodecResult<Option<i8>> {
    strict_parse_long(value)?.map(narrow::<i8>).transpose()
}

/// Parse a double where strings may only hold the non-finite sentinels.
pub fn limited_parse_double(value: &Value) -> CodecResult<Option<f64>> {
    match value {
        Value::String(s) => parse_float_sentinel(s).map(Some),
        other => expect_number(other),
    }
}

/// Alias of [`limited_parse_double`].
pub fn handle_float(value: &Value) -> CodecResult<Option<f64>> {
    limited_parse_double(value)
}

/// Alias of [`limited_parse_double`].
pub fn limited_parse_float(value: &Value) -> CodecResult<Option<f64>> {
    limited_parse_double(value)
}

pub fn limited_parse_float32(value: &Value) -> CodecResult<Option<f32>> {
    match value {
        Value::String(s) => parse_float_sentinel(s).map(|f| Some(f as f32)),
        other => expect_float32(other),
    }
}

/// Serialize a double, writing non-finite values as their string sentinels.
pub fn serialize_float(value: f64) -> Value {
    if value.is_nan() {
        Value::String("NaN".to_string())
    } else if value == f64::INFINITY {
        Value::String("Infinity".to_string())
    } else if value == f64::NEG_INFINITY {
        Value::String("-Infinity".to_string())
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

/// Parse a string that must be exactly one numeric literal.
///
/// Anything a lenient `parseFloat` would silently truncate, such as `"1a"` or
/// `"1 2"`, is rejected.
pub(crate) fn parse_number(value: &str) -> CodecResult<f64> {
    let mut matches = NUMBER_LITERAL.find_iter(value);
    let first = matches.next();
    match first {
        Some(m) if m.as_str().len() == value.len() && matches.next().is_none() => {}
        _ => return Err(CodecError::ImplicitNaN),
    }
    match value {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        literal => literal.parse::<f64>().map_err(|_| CodecError::ImplicitNaN),
    }
}

fn parse_float_sentinel(value: &str) -> CodecResult<f64> {
    match value {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        other => Err(CodecError::InvalidFloat(other.to_string())),
    }
}

fn parse_float_prefix(value: &str) -> Option<f64> {
    let trimmed = value.trim_start();
    let prefix = FLOAT_PREFIX.find(trimmed)?.as_str();
    let unsigned = prefix.trim_start_matches(['+', '-']);
    if unsigned == "Infinity" {
        return Some(if prefix.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    prefix.parse::<f64>().ok()
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        value.to_string()
    }
}

fn check_float32(value: f64) -> CodecResult<f32> {
    if value.is_finite() && value.abs() > MAX_FLOAT32 {
        return Err(CodecError::Float32OutOfRange(value));
    }
    Ok(value as f32)
}

fn number_to_long(n: &Number) -> CodecResult<i64> {
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    if n.is_u64() {
        return Err(CodecError::Overflow {
            expected: 64,
            value: n.to_string(),
        });
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    integral(f, &Value::Number(n.clone()))
}

fn integral(f: f64, original: &Value) -> CodecResult<i64> {
    if !f.is_finite() || f.fract() != 0.0 {
        return Err(CodecError::TypeMismatch {
            expected: "integer",
            actual: describe(original),
        });
    }
    // i64::MAX is not exactly representable; 2^63 is the first out-of-range double.
    if f >= 9_223_372_036_854_775_808.0 || f < -9_223_372_036_854_775_808.0 {
        return Err(CodecError::Overflow {
            expected: 64,
            value: format_number(f),
        });
    }
    Ok(f as i64)
}

fn narrow<T>(value: i64) -> CodecResult<T>
where
    T: TryFrom<i64>,
{
    T::try_from(value).map_err(|_| CodecError::Overflow {
        expected: (std::mem::size_of::<T>() * 8) as u8,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_int32_boundary() {
        assert_eq!(expect_int32(&json!(2147483647)).unwrap(), Some(2147483647));
        assert_eq!(
            expect_int32(&json!(2147483648_i64)),
            Err(CodecError::Overflow {
                expected: 32,
                value: "2147483648".to_string()
            })
        );
        assert_eq!(expect_int32(&json!(-2147483648_i64)).unwrap(), Some(i32::MIN));
    }

    #[rstest]
    #[case(json!(127), Some(127))]
    #[case(json!(-128), Some(-128))]
    #[case(Value::Null, None)]
    fn test_expect_byte_accepts(#[case] input: Value, #[case] expected: Option<i8>) {
        assert_eq!(expect_byte(&input).unwrap(), expected);
    }

    #[rstest]
    #[case(json!(128))]
    #[case(json!(-129))]
    #[case(json!(1.5))]
    #[case(json!("1"))]
    fn test_expect_byte_rejects(#[case] input: Value) {
        assert!(expect_byte(&input).is_err());
    }

    #[test]
    fn test_expect_short_overflow() {
        assert_eq!(expect_short(&json!(32767)).unwrap(), Some(32767));
        assert!(matches!(
            expect_short(&json!(32768)),
            Err(CodecError::Overflow { expected: 16, .. })
        ));
    }

    #[test]
    fn test_expect_long_accepts_integral_doubles() {
        assert_eq!(expect_long(&json!(3.0)).unwrap(), Some(3));
        assert!(expect_long(&json!(3.25)).is_err());
        assert!(expect_long(&json!(u64::MAX)).is_err());
        assert!(expect_long(&json!(true)).is_err());
    }

    #[test]
    fn test_expect_number_lenient_strings() {
        assert_eq!(expect_number(&json!(1.5)).unwrap(), Some(1.5));
        assert_eq!(expect_number(&json!("1.5")).unwrap(), Some(1.5));
        // Lenient prefix parsing keeps the leading number.
        assert_eq!(expect_number(&json!("12abc")).unwrap(), Some(12.0));
        assert!(expect_number(&json!("abc")).is_err());
        assert!(expect_number(&json!([1])).is_err());
    }

    #[test]
    fn test_expect_float32_range() {
        assert_eq!(expect_float32(&json!(1.5)).unwrap(), Some(1.5_f32));
        assert!(matches!(
            expect_float32(&json!(1e39)),
            Err(CodecError::Float32OutOfRange(_))
        ));
    }

    #[rstest]
    #[case("1")]
    #[case("-1.5")]
    #[case("1e10")]
    #[case("0.25")]
    fn test_strict_parse_double_accepts_literals(#[case] input: &str) {
        let expected: f64 = input.parse().unwrap();
        assert_eq!(strict_parse_double(&json!(input)).unwrap(), Some(expected));
    }

    #[rstest]
    #[case("1a")]
    #[case("1 2")]
    #[case("")]
    #[case("01")]
    #[case(" 1")]
    fn test_strict_parse_double_rejects_implicit_nan(#[case] input: &str) {
        assert_eq!(
            strict_parse_double(&json!(input)),
            Err(CodecError::ImplicitNaN)
        );
    }

    #[test]
    fn test_strict_parse_int32_from_string() {
        assert_eq!(strict_parse_int32(&json!("42")).unwrap(), Some(42));
        assert!(strict_parse_int32(&json!("2147483648")).is_err());
        assert!(strict_parse_int32(&json!("4.2")).is_err());
        assert!(strict_parse_long(&json!("NaN")).is_err());
    }

    #[test]
    fn test_limited_parse_double_sentinels() {
        assert!(limited_parse_double(&json!("NaN")).unwrap().unwrap().is_nan());
        assert_eq!(
            limited_parse_double(&json!("Infinity")).unwrap(),
            Some(f64::INFINITY)
        );
        assert_eq!(
            limited_parse_double(&json!("-Infinity")).unwrap(),
            Some(f64::NEG_INFINITY)
        );
        assert_eq!(
            limited_parse_double(&json!("1.5")),
            Err(CodecError::InvalidFloat("1.5".to_string()))
        );
        assert_eq!(limited_parse_double(&json!(2.5)).unwrap(), Some(2.5));
        assert_eq!(
            limited_parse_float32(&json!("Infinity")).unwrap(),
            Some(f32::INFINITY)
        );
    }

    #[test]
    fn test_serialize_float_sentinels() {
        assert_eq!(serialize_float(f64::NAN), json!("NaN"));
        assert_eq!(serialize_float(f64::INFINITY), json!("Infinity"));
        assert_eq!(serialize_float(f64::NEG_INFINITY), json!("-Infinity"));
        assert_eq!(serialize_float(1.25), json!(1.25));
        assert!(strict_parse_double(&serialize_float(f64::NAN))
            .unwrap()
            .unwrap()
            .is_nan());
    }

    proptest! {
        #[test]
        fn prop_serialize_float_round_trips(value in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
            let parsed = strict_parse_double(&serialize_float(value)).unwrap();
            prop_assert_eq!(parsed, Some(value));
        }

        #[test]
        fn prop_strict_parse_long_round_trips_decimal_text(value in any::<i32>()) {
            let parsed = strict_parse_long(&Value::String(value.to_string())).unwrap();
            prop_assert_eq!(parsed, Some(i64::from(value)));
        }
    }
}
