//! Timestamp helpers
//!
//! Upstream moments travel as `YYYY-MM-DD HH:MM:SS[.fff]` strings; these
//! helpers parse and normalize them for sorting and date-floor cutoffs.

use chrono::NaiveDateTime;

/// Upstream moment format (seconds precision)
pub const MOMENT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current UTC time rendered in the upstream moment format
pub fn now_moment() -> String {
    chrono::Utc::now().format(MOMENT_FORMAT).to_string()
}

/// Parse an upstream moment; tolerates millisecond suffixes and bare dates
pub fn parse_moment(moment: &str) -> Option<NaiveDateTime> {
    let m = moment.trim();
    if m.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(m, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(m, MOMENT_FORMAT))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(m, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Normalize a date floor for upstream filters: bare `YYYY-MM-DD` becomes
/// `YYYY-MM-DD 00:00:00`, everything else passes through trimmed
pub fn normalize_moment_floor(date_from: &str) -> String {
    let df = date_from.trim();
    if df.len() == 10 {
        format!("{df} 00:00:00")
    } else {
        df.to_string()
    }
}
