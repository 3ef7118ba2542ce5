//! Shared wire utilities for sdk-dispatch clients:
//! - Strict and lenient scalar coercion (numbers, booleans, date-times, unions)
//! - Declarative object projection for generated (de)serializers
//! - URI label and header helpers
//! - The configurable [`Logger`] sink and the unsupported-version warning flag
//!

mod error;
pub mod json;
pub mod logger;
pub mod mapping;
pub mod scalar;
pub mod text;
mod warning;

pub use error::{CodecError, CodecResult};
pub use json::{strip_nulls, SENSITIVE_STRING};
pub use logger::{LogFacadeLogger, Logger, NoOpLogger};
pub use mapping::{
    convert_map, map, map_into, map_with_filter, take, Candidate, Filter, Instruction,
    SourceInstruction,
};
pub use warning::VersionWarning;
