//! Unix-second timestamp helpers.

use chrono::{TimeZone, Utc};

/// Current time in Unix seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Render Unix seconds as a `YYYY-MM-DD` date (UTC).
///
/// Out-of-range values render as an empty string.
pub fn format_timestamp(secs: i64) -> String {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => String::new(),
    }
}
