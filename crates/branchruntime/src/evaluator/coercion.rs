use branchcore::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;

/// Parse a finite number from text. Surrounding whitespace is ignored.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numeric view of a value: numbers, and text that parses as a number.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(s) => parse_number(s),
        _ => None,
    }
}

/// Text view of a scalar value. Arrays, objects and null have none.
pub fn to_scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_text()),
        _ => None,
    }
}

/// `==` semantics shared by equality and array membership.
pub fn loosely_equal(left: &Value, right: &str) -> bool {
    match (to_number(left), parse_number(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left.to_text() == right,
    }
}

/// A parsed timestamp, remembering whether it carried a time of day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateValue {
    pub instant: NaiveDateTime,
    pub date_only: bool,
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Parse RFC 3339, `YYYY-MM-DD[ T]HH:MM[:SS]`, `YYYY-MM-DD` or `YYYY/MM/DD`.
///
/// Offsets are normalised to UTC; naive timestamps are taken as UTC.
pub fn parse_date(text: &str) -> Option<DateValue> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(DateValue {
            instant: dt.naive_utc(),
            date_only: false,
        });
    }
    for format in DATETIME_FORMATS {
        if let Ok(instant) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(DateValue {
                instant,
                date_only: false,
            });
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0).map(|instant| DateValue {
                instant,
                date_only: true,
            });
        }
    }
    None
}

/// Compare calendar dates when either side is date-only, instants otherwise.
pub fn compare_dates(left: &DateValue, right: &DateValue) -> Ordering {
    if left.date_only || right.date_only {
        left.instant.date().cmp(&right.instant.date())
    } else {
        left.instant.cmp(&right.instant)
    }
}

/// Canonical type names accepted by `type_equals`.
pub const TYPE_NAMES: [&str; 6] = ["string", "number", "boolean", "array", "object", "null"];
