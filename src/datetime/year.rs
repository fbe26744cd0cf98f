use chrono::{Datelike, NaiveDate};
use tracing::warn;

use crate::common::constants::MAX_INFERRED_FUTURE_DAYS;

/// Pick a year for a listing that only gives month and day.
///
/// Listings only show upcoming events, so a month earlier than this one (or
/// this month with the day already gone) belongs to next year.
pub fn infer_year(month: u32, day: u32, today: NaiveDate) -> i32 {
    let current = today.year();
    let already_passed = month < today.month() || (month == today.month() && day < today.day());
    if already_passed {
        current + 1
    } else {
        current
    }
}

/// Expand a two-digit year to 20xx.
///
/// A result more than ~18 months ahead of `today` is taken as a misparse and
/// the year is inferred from month and day instead.
pub fn resolve_short_year(short: i32, month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(2000 + short, month, day)?;
    if (date - today).num_days() > MAX_INFERRED_FUTURE_DAYS {
        warn!(
            "Date {} is too far ahead of {}; inferring the year instead",
            date, today
        );
        return resolve_date(None, month, day, today);
    }
    Some(date)
}

/// Build a date from month/day, inferring the year when none was printed.
pub fn resolve_date(year: Option<i32>, month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    let year = year.unwrap_or_else(|| infer_year(month, day, today));
    NaiveDate::from_ymd_opt(year, month, day)
}
