//! Date and time parsing for venue listings.
//!
//! Venue sites print dates in a dozen shapes ("Today", "Monday 11th August",
//! "Wed.13.Aug.25", "12 Aug 2025" plus a separate doors time, ...). Everything
//! here resolves to a [`ParsedDate`], which becomes an ISO-8601 UTC timestamp.

pub mod date;
pub mod formats;
pub mod time;
pub mod year;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub use formats::{DateFormat, DateFormatRegistry};

/// Hour used when a listing only gives a date
pub const PLACEHOLDER_HOUR: u32 = 12;

/// What parsing needs to know about "now" and where the venue is.
#[derive(Debug, Clone, Copy)]
pub struct DateContext {
    pub today: NaiveDate,
    pub timezone: Option<Tz>,
}

impl DateContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            timezone: None,
        }
    }

    pub fn with_timezone(mut self, timezone: Option<Tz>) -> Self {
        self.timezone = timezone;
        self
    }

    /// Convert a venue wall-clock time to UTC. Without a timezone the wall clock is taken as UTC.
    pub fn local_to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self.timezone {
            Some(tz) => tz
                .from_local_datetime(&local)
                .earliest()
                // Inside a DST gap the wall time does not exist; shift past it
                .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&local)),
            None => Utc.from_utc_datetime(&local),
        }
    }
}

/// A calendar date with an optional wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl ParsedDate {
    pub fn new(date: NaiveDate, time: Option<NaiveTime>) -> Self {
        Self { date, time }
    }

    /// Merge a separately supplied time, keeping an inline one if present.
    pub fn or_time(mut self, time: Option<NaiveTime>) -> Self {
        if self.time.is_none() {
            self.time = time;
        }
        self
    }

    /// Date-only values land on a noon UTC placeholder so the calendar day survives any offset.
    pub fn to_utc(&self, ctx: &DateContext) -> DateTime<Utc> {
        match self.time {
            Some(time) => ctx.local_to_utc(self.date.and_time(time)),
            None => Utc.from_utc_datetime(&self.date.and_time(placeholder_time())),
        }
    }

    pub fn to_iso(&self, ctx: &DateContext) -> String {
        to_iso(&self.to_utc(ctx))
    }
}

pub fn placeholder_time() -> NaiveTime {
    NaiveTime::from_hms_opt(PLACEHOLDER_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// `2025-08-13T12:00:00.000Z`
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Accepts RFC 3339 timestamps and the `.000Z` form produced by [`to_iso`].
pub fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
