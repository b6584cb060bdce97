//! Lenient timestamp parsing for raw record fields.
//!
//! Raw stores deliver timestamps as text. Anything that does not parse is
//! treated as missing, never as an error and never as zero.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Parse a raw timestamp field. Empty, absent or malformed values yield `None`.
pub fn parse_lenient(raw: Option<&str>) -> Option<NaiveDateTime> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Signed difference `later - earlier` in fractional days.
pub fn days_between(later: NaiveDateTime, earlier: NaiveDateTime) -> f64 {
    to_days(later - earlier)
}

pub fn to_days(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Whole 30-day months between two instants, rounded half-to-even.
pub fn months_between(first: NaiveDateTime, last: NaiveDateTime) -> u32 {
    let months = days_between(last, first) / 30.0;
    months.round_ties_even().max(0.0) as u32
}
