//! RFC3339 timestamps. Every `datetime` column and every system-table
//! timestamp column is stored in this form, UTC, so string comparison
//! orders chronologically.

use chrono::{DateTime, Duration, Utc};

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn unix_seconds_now() -> i64 {
    Utc::now().timestamp()
}

pub fn rfc3339_seconds_from_now(seconds: i64) -> String {
    (Utc::now() + Duration::seconds(seconds)).to_rfc3339()
}

pub fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Renders an absolute unix timestamp (e.g. a JWT `exp` claim) back to the
/// storage format, rather than computing an offset from "now".
pub fn rfc3339_from_unix(seconds: i64) -> String {
    DateTime::<Utc>::from_utc(chrono::NaiveDateTime::from_timestamp_opt(seconds, 0).unwrap_or_default(), Utc).to_rfc3339()
}
