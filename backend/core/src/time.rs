//! Day bucketing and duration helpers.
//!
//! Every day key is computed in UTC, for every record and every code path.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::LedgerError;

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// The `YYYY-MM-DD` bucket that `at` falls into.
pub fn day_key(at: DateTime<Utc>) -> String {
    at.format(DAY_KEY_FORMAT).to_string()
}

/// Validate a caller-supplied day key and return it in canonical form.
pub fn parse_day_key(raw: &str) -> Result<String, LedgerError> {
    NaiveDate::parse_from_str(raw.trim(), DAY_KEY_FORMAT)
        .map(|d| d.format(DAY_KEY_FORMAT).to_string())
        .map_err(|_| LedgerError::InvalidDate(raw.to_string()))
}

/// Whole seconds from `from` to `to`, clamped to zero when `to` is earlier.
pub fn elapsed_whole_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    let millis = (to - from).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis / 1000) as u64
    }
}

/// Render seconds as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}
