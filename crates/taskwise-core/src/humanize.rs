//! Relative time strings in the style of "3 hours ago" / "2 days from now".

use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

const UNITS: &[(&str, i64)] = &[
    ("year", YEAR),
    ("month", MONTH),
    ("week", WEEK),
    ("day", DAY),
    ("hour", HOUR),
    ("minute", MINUTE),
    ("second", 1),
];

/// Render `then` relative to `now` using the largest whole unit.
pub fn diff_for_humans(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then).num_seconds();
    let (suffix, secs) = if delta >= 0 {
        ("ago", delta)
    } else {
        ("from now", -delta)
    };

    let (unit, count) = UNITS
        .iter()
        .find(|(_, size)| secs >= *size)
        .map(|(unit, size)| (*unit, secs / size))
        .unwrap_or(("second", 1));

    if count == 1 {
        format!("1 {unit} {suffix}")
    } else {
        format!("{count} {unit}s {suffix}")
    }
}
