//! Error types for wire value coercion.

use thiserror::Error;

/// Errors raised when a decoded wire value cannot be coerced to the scalar
/// type the service model promises.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The value has the wrong JSON type for the requested scalar.
    #[error("Expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// The value is integral but does not fit the requested width.
    #[error("Expected {expected}-bit integer, got {value}")]
    Overflow { expected: u8, value: String },

    /// A float exceeded the maximum finite 32-bit magnitude.
    #[error("Expected 32-bit float, got {0}")]
    Float32OutOfRange(f64),

    /// A string looked numeric to a lenient parser but is not a strict literal.
    #[error("Expected real number, got implicit NaN")]
    ImplicitNaN,

    /// A string was neither a number nor one of the float sentinels.
    #[error("Unable to parse float value: {0}")]
    InvalidFloat(String),

    /// A date-time string did not match its grammar or held out-of-range fields.
    #[error("{0}")]
    InvalidDateTime(String),

    /// A tagged union had zero or several populated members.
    #[error("Unions must have exactly one non-null member. {0}")]
    InvalidUnion(String),

    /// A required value was null.
    #[error("Expected a non-null value for {0}")]
    UnexpectedNull(String),

    /// A URI label referenced by a path template was missing or empty.
    #[error("{0}")]
    InvalidLabel(String),
}

impl CodecError {
    pub(crate) fn type_mismatch(expected: &'static str, actual: &serde_json::Value) -> Self {
        Self::TypeMismatch {
            expected,
            actual: describe(actual),
        }
    }

    pub(crate) fn invalid_date(message: impl Into<String>) -> Self {
        Self::InvalidDateTime(message.into())
    }
}

/// Render a value the way error messages quote it: the JSON type and the value.
pub(crate) fn describe(value: &serde_json::Value) -> String {
    let kind = match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    };
    format!("{kind} ({value})")
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
