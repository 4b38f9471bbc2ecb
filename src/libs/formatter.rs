//! Conversions between epoch-millisecond instants and display text.
//!
//! Records store instants as epoch milliseconds; the command line shows and
//! accepts local wall-clock time.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Current instant in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_utc(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Formats an instant as local `YYYY-MM-DD HH:MM`, or `-` for an absent one.
pub fn format_timestamp(millis: Option<i64>) -> String {
    match millis.and_then(|ms| Local.timestamp_millis_opt(ms).single()) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// Parses user input into epoch milliseconds.
///
/// Accepts RFC 3339 (`2025-01-15T09:00:00Z`), local `YYYY-MM-DD HH:MM`,
/// local `YYYY-MM-DD` (midnight) and a raw millisecond count.
pub fn parse_datetime(input: &str) -> Option<i64> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M") {
        return Local.from_local_datetime(&naive).earliest().map(|dt| dt.timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return Local.from_local_datetime(&naive).earliest().map(|dt| dt.timestamp_millis());
    }
    input.parse::<i64>().ok()
}
