//! ISO-8601 timestamps in the stored format (`2024-05-01T12:30:00.000Z`).
//!
//! Every timestamp the data layer writes uses millisecond precision and a `Z`
//! suffix. A stored timestamp is valid only if it survives a parse/format round
//! trip unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Current time in the stored format.
#[must_use]
pub fn now_iso() -> String {
    format_iso(Utc::now())
}

/// Format a UTC timestamp in the stored format.
#[must_use]
pub fn format_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp into UTC.
#[must_use]
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// True when `s` parses and formats back to exactly `s`.
#[must_use]
pub fn is_canonical_iso(s: &str) -> bool {
    parse_iso(s).is_some_and(|dt| format_iso(dt) == s)
}

/// Lenient parse used on relational source data.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` and `YYYY-MM-DDTHH:MM:SS[.fff]`
/// (both read as UTC), bare dates, and epoch milliseconds.
#[must_use]
pub fn parse_lenient(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Some(dt) = parse_iso(s) {
                return Some(dt);
            }
            for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Normalize a source value to the stored format, if it is a timestamp.
#[must_use]
pub fn normalize(value: &Value) -> Option<String> {
    parse_lenient(value).map(format_iso)
}
