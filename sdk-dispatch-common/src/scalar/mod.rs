//! Strict and lenient coercion of wire-decoded scalars.
//!
//! Every function takes a value that has already been decoded from the wire
//! (JSON, or XML mapped onto JSON values) and returns the target scalar type.
//! `null` is always accepted and maps to `None`; any other mismatch is a
//! [`CodecError`](crate::CodecError).

mod boolean;
mod date_time;
mod number;
mod structure;

pub use boolean::{expect_boolean, parse_boolean};
pub use date_time::{
    date_to_utc_string, parse_epoch_timestamp, parse_rfc3339_date_time,
    parse_rfc3339_date_time_with_offset, parse_rfc7231_date_time, serialize_date_time,
};
pub use number::{
    expect_byte, expect_float32, expect_int, expect_int32, expect_long, expect_number,
    expect_short, handle_float, limited_parse_double, limited_parse_float, limited_parse_float32,
    serialize_float, strict_parse_byte, strict_parse_double, strict_parse_float,
    strict_parse_float32, strict_parse_int, strict_parse_int32, strict_parse_long,
    strict_parse_short, MAX_FLOAT32,
};
pub use structure::{expect_non_null, expect_object, expect_string, expect_union};
