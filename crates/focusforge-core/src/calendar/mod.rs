//! Canonical day-key formatting and day arithmetic.
//!
//! Every date comparison in the engine goes through this module. Streak and
//! focus-score logic must never subtract raw timestamps across days: a day
//! is a calendar day, and day distance is computed on calendar dates so the
//! math stays stable across daylight-saving transitions.
//!
//! Day keys are `YYYY-MM-DD` strings; week keys are the Monday starting the
//! ISO week; month keys are `YYYY-MM`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::error::ValidationError;

/// Storage and wire format for day keys.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Format a point in time as its calendar-day key.
pub fn day_key(ts: DateTime<Utc>) -> String {
    ts.date_naive().format(DAY_KEY_FORMAT).to_string()
}

/// The calendar date of a point in time.
pub fn day_of(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// Parse a day key back into a calendar date.
///
/// # Errors
/// Returns an error if the key is not a valid `YYYY-MM-DD` date.
pub fn parse_day(key: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(key, DAY_KEY_FORMAT)
        .map_err(|_| ValidationError::InvalidDayKey(key.to_string()))
}

/// Signed distance in whole days between two day keys (`b - a`).
///
/// # Errors
/// Returns an error if either key is malformed.
pub fn days_apart(a: &str, b: &str) -> Result<i64, ValidationError> {
    let a = parse_day(a)?;
    let b = parse_day(b)?;
    Ok((b - a).num_days())
}

/// The Monday starting the ISO week that contains `date`.
///
/// A week that contains a Sunday ends on that Sunday; it does not start
/// on it.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as i64;
    date - Duration::days(offset)
}

/// Month key (`YYYY-MM`) for grouping sessions by calendar month.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}
