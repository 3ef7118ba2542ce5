//! Date-time grammars used on the wire.
//!
//! Three textual grammars are recognised, each with its own regex and field-range
//! validation:
//!
//! - RFC 3339 in UTC (`2024-02-29T12:00:00.250Z`)
//! - RFC 3339 with a numeric offset (`2024-02-29T12:00:00+02:00`)
//! - RFC 7231 in its IMF-fixdate, obsolete RFC 850 and asctime forms
//!
//! Epoch timestamps are numbers (or numeric strings) of seconds, rounded to the
//! nearest millisecond.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use regex::{Captures, Regex};
use serde_json::Value;

use super::number::{parse_number, strict_parse_double};
use crate::error::{CodecError, CodecResult};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const FIFTY_YEARS_IN_MILLIS: i64 = 50 * 365 * 24 * 60 * 60 * 1000;

static RFC3339: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[tT](\d{2}):(\d{2}):(\d{2})(?:\.(\d+))?[zZ]$")
        .expect("RFC 3339 pattern is valid")
});

static RFC3339_WITH_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})[tT](\d{2}):(\d{2}):(\d{2})(?:\.(\d+))?(([-+]\d{2}:\d{2})|[zZ])$",
    )
    .expect("RFC 3339 offset pattern is valid")
});

static IMF_FIXDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun), (\d{2}) (Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) (\d{4}) (\d{1,2}):(\d{2}):(\d{2})(?:\.(\d+))? GMT$",
    )
    .expect("IMF-fixdate pattern is valid")
});

static RFC_850: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday), (\d{2})-(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)-(\d{2}) (\d{1,2}):(\d{2}):(\d{2})(?:\.(\d+))? GMT$",
    )
    .expect("RFC 850 pattern is valid")
});

static ASC_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun) (Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) ( [1-9]|\d{2}) (\d{1,2}):(\d{2}):(\d{2})(?:\.(\d+))? (\d{4})$",
    )
    .expect("asctime pattern is valid")
});

/// Time-of-day fields as captured from a date-time string.
struct TimeFields<'a> {
    hours: &'a str,
    minutes: &'a str,
    seconds: &'a str,
    fractional: Option<&'a str>,
}

impl<'a> TimeFields<'a> {
    fn from_captures(caps: &Captures<'a>, first: usize) -> Self {
        Self {
            hours: group(caps, first),
            minutes: group(caps, first + 1),
            seconds: group(caps, first + 2),
            fractional: caps.get(first + 3).map(|m| m.as_str()),
        }
    }
}

/// Parse an RFC 3339 date-time in UTC (`Z` suffix only).
pub fn parse_rfc3339_date_time(value: &Value) -> CodecResult<Option<DateTime<Utc>>> {
    let Some(text) = date_string(value, "RFC-3339")? else {
        return Ok(None);
    };
    let caps = RFC3339
        .captures(text)
        .ok_or_else(|| CodecError::invalid_date("Invalid RFC-3339 date-time value"))?;
    build_date(
        parse_year(group(&caps, 1))?,
        parse_date_value(group(&caps, 2), "month", 1, 12)?,
        parse_date_value(group(&caps, 3), "day", 1, 31)?,
        &TimeFields::from_captures(&caps, 4),
    )
    .map(Some)
}

/// Parse an RFC 3339 date-time that may carry a `±hh:mm` offset.
///
/// The offset is subtracted so the result is the same instant in UTC.
pub fn parse_rfc3339_date_time_with_offset(
    value: &Value,
) -> CodecResult<Option<DateTime<Utc>>> {
    let Some(text) = date_string(value, "RFC-3339")? else {
        return Ok(None);
    };
    let caps = RFC3339_WITH_OFFSET
        .captures(text)
        .ok_or_else(|| CodecError::invalid_date("Invalid RFC-3339 date-time value"))?;
    let date = build_date(
        parse_year(group(&caps, 1))?,
        parse_date_value(group(&caps, 2), "month", 1, 12)?,
        parse_date_value(group(&caps, 3), "day", 1, 31)?,
        &TimeFields::from_captures(&caps, 4),
    )?;
    let offset = group(&caps, 8);
    if offset.eq_ignore_ascii_case("z") {
        return Ok(Some(date));
    }
    Ok(Some(date - Duration::milliseconds(parse_offset_millis(offset)?)))
}

/// Parse any of the three RFC 7231 forms.
pub fn parse_rfc7231_date_time(value: &Value) -> CodecResult<Option<DateTime<Utc>>> {
    parse_rfc7231_date_time_at(value, Utc::now())
}

/// RFC 7231 parsing against a fixed `now`, which anchors the two-digit year window
/// of the obsolete RFC 850 form.
pub(crate) fn parse_rfc7231_date_time_at(
    value: &Value,
    now: DateTime<Utc>,
) -> CodecResult<Option<DateTime<Utc>>> {
    let Some(text) = date_string(value, "RFC-7231")? else {
        return Ok(None);
    };

    if let Some(caps) = IMF_FIXDATE.captures(text) {
        return build_date(
            parse_year(group(&caps, 3))?,
            parse_month_by_short_name(group(&caps, 2))?,
            parse_date_value(group(&caps, 1), "day", 1, 31)?,
            &TimeFields::from_captures(&caps, 4),
        )
        .map(Some);
    }

    if let Some(caps) = RFC_850.captures(text) {
        let date = build_date(
            parse_two_digit_year(group(&caps, 3), now)?,
            parse_month_by_short_name(group(&caps, 2))?,
            parse_date_value(group(&caps, 1), "day", 1, 31)?,
            &TimeFields::from_captures(&caps, 4),
        )?;
        return adjust_rfc850_year(date, now).map(Some);
    }

    if let Some(caps) = ASC_TIME.captures(text) {
        return build_date(
            parse_year(group(&caps, 7))?,
            parse_month_by_short_name(group(&caps, 1))?,
            parse_date_value(group(&caps, 2).trim_start(), "day", 1, 31)?,
            &TimeFields::from_captures(&caps, 3),
        )
        .map(Some);
    }

    Err(CodecError::invalid_date("Invalid RFC-7231 date-time value"))
}

/// Parse an epoch timestamp in seconds, rounded to the nearest millisecond.
pub fn parse_epoch_timestamp(value: &Value) -> CodecResult<Option<DateTime<Utc>>> {
    let seconds = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(_) => strict_parse_double(value)?.unwrap_or(f64::NAN),
        _ => {
            return Err(CodecError::invalid_date(
                "Epoch timestamps must be expressed as floating point numbers or their string representation",
            ))
        }
    };
    if !seconds.is_finite() {
        return Err(CodecError::invalid_date(
            "Epoch timestamps must be valid, non-Infinite, non-NaN numerics",
        ));
    }
    let millis = (seconds * 1000.0 + 0.5).floor();
    DateTime::from_timestamp_millis(millis as i64)
        .map(Some)
        .ok_or_else(|| CodecError::invalid_date(format!("Epoch timestamp out of range: {seconds}")))
}

/// Format a date-time as RFC 3339 with millisecond precision, dropping an all-zero
/// fraction (`2024-01-01T00:00:00Z`).
pub fn serialize_date_time(date: &DateTime<Utc>) -> String {
    let formatted = date.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    match formatted.strip_suffix(".000Z") {
        Some(prefix) => format!("{prefix}Z"),
        None => formatted,
    }
}

/// Format a date-time as an RFC 7231 IMF-fixdate.
pub fn date_to_utc_string(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn date_string<'a>(value: &'a Value, grammar: &str) -> CodecResult<Option<&'a str>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        _ => Err(CodecError::invalid_date(format!(
            "{grammar} date-times must be expressed as strings"
        ))),
    }
}

fn group<'a>(caps: &Captures<'a>, index: usize) -> &'a str {
    caps.get(index).map_or("", |m| m.as_str())
}

fn build_date(year: i32, month: u32, day: u32, time: &TimeFields<'_>) -> CodecResult<DateTime<Utc>> {
    validate_day_of_month(year, month, day)?;
    let hours = parse_date_value(time.hours, "hour", 0, 23)?;
    let minutes = parse_date_value(time.minutes, "minute", 0, 59)?;
    // 60 admits leap seconds, which roll into the next minute.
    let seconds = parse_date_value(time.seconds, "seconds", 0, 60)?;
    let millis = parse_milliseconds(time.fractional)?;
    utc_from_fields(year, month, day, hours, minutes, seconds, millis)
}

/// Assemble an instant from calendar fields, letting out-of-range days and seconds
/// roll over into the following period.
fn utc_from_fields(
    year: i32,
    month: u32,
    day: u32,
    hours: u32,
    minutes: u32,
    seconds: u32,
    millis: i64,
) -> CodecResult<DateTime<Utc>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CodecError::invalid_date(format!("Invalid date: {year}-{month}")))?;
    let midnight = first
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CodecError::invalid_date(format!("Invalid date: {year}-{month}")))?
        .and_utc();
    Ok(midnight
        + Duration::days(i64::from(day) - 1)
        + Duration::hours(i64::from(hours))
        + Duration::minutes(i64::from(minutes))
        + Duration::seconds(i64::from(seconds))
        + Duration::milliseconds(millis))
}

fn validate_day_of_month(year: i32, month: u32, day: u32) -> CodecResult<()> {
    let index = (month - 1) as usize;
    let mut max_days = DAYS_IN_MONTH[index];
    if month == 2 && is_leap_year(year) {
        max_days = 29;
    }
    if day > max_days {
        return Err(CodecError::invalid_date(format!(
            "Invalid day for {} in {year}: {day}",
            MONTHS[index]
        )));
    }
    Ok(())
}

fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn parse_year(value: &str) -> CodecResult<i32> {
    parse_bounded(value, "year", 0, 9999).map(|y| y as i32)
}

fn parse_date_value(value: &str, kind: &str, lower: u32, upper: u32) -> CodecResult<u32> {
    parse_bounded(value, kind, lower, upper)
}

fn parse_bounded(value: &str, kind: &str, lower: u32, upper: u32) -> CodecResult<u32> {
    let parsed = parse_number(strip_leading_zeroes(value))
        .map_err(|_| CodecError::invalid_date(format!("Invalid {kind}: {value}")))?;
    if !parsed.is_finite() || parsed.fract() != 0.0 {
        return Err(CodecError::invalid_date(format!("Invalid {kind}: {value}")));
    }
    if parsed < f64::from(lower) || parsed > f64::from(upper) {
        return Err(CodecError::invalid_date(format!(
            "{kind} must be between {lower} and {upper}, inclusive"
        )));
    }
    Ok(parsed as u32)
}

fn parse_milliseconds(value: Option<&str>) -> CodecResult<i64> {
    let Some(fraction) = value else {
        return Ok(0);
    };
    let parsed = parse_number(&format!("0.{fraction}"))
        .map_err(|_| CodecError::invalid_date(format!("Invalid fractional seconds: {fraction}")))?;
    Ok((parsed * 1000.0).round() as i64)
}

fn parse_month_by_short_name(value: &str) -> CodecResult<u32> {
    MONTHS
        .iter()
        .position(|m| *m == value)
        .map(|idx| idx as u32 + 1)
        .ok_or_else(|| CodecError::invalid_date(format!("Invalid month: {value}")))
}

/// Resolve a two-digit year into the current century, moving it one century ahead
/// when it would otherwise lie in the past.
fn parse_two_digit_year(value: &str, now: DateTime<Utc>) -> CodecResult<i32> {
    let this_year = now.year();
    let two_digits = parse_bounded(value, "year", 0, 99)? as i32;
    let in_this_century = (this_year / 100) * 100 + two_digits;
    if in_this_century < this_year {
        return Ok(in_this_century + 100);
    }
    Ok(in_this_century)
}

/// Dates more than fifty years in the future are moved back a century.
fn adjust_rfc850_year(input: DateTime<Utc>, now: DateTime<Utc>) -> CodecResult<DateTime<Utc>> {
    if input.timestamp_millis() - now.timestamp_millis() <= FIFTY_YEARS_IN_MILLIS {
        return Ok(input);
    }
    utc_from_fields(
        input.year() - 100,
        input.month(),
        input.day(),
        input.hour(),
        input.minute(),
        input.second(),
        i64::from(input.timestamp_subsec_millis()),
    )
}

fn parse_offset_millis(value: &str) -> CodecResult<i64> {
    let direction = match value.chars().next() {
        Some('+') => 1,
        Some('-') => -1,
        other => {
            return Err(CodecError::invalid_date(format!(
                "Offset direction, {}, must be \"+\" or \"-\"",
                other.map(String::from).unwrap_or_default()
            )))
        }
    };
    let hours = parse_bounded(value.get(1..3).unwrap_or(""), "offset hour", 0, 99)?;
    let minutes = parse_bounded(value.get(4..6).unwrap_or(""), "offset minute", 0, 59)?;
    Ok(direction * i64::from(hours * 60 + minutes) * 60 * 1000)
}

fn strip_leading_zeroes(value: &str) -> &str {
    let bytes = value.as_bytes();
    let mut idx = 0;
    while idx + 1 < bytes.len() && bytes[idx] == b'0' {
        idx += 1;
    }
    &value[idx..]
}
