use chrono::{Duration, Timelike};
use tracing::debug;

use super::{TransformArgs, TransformContext};
use crate::datetime::time::{self, format_hhmm, parse_time_range};
use crate::datetime::ParsedDate;

pub fn time_range_start(value: &str) -> Option<String> {
    parse_time_range(value).map(|(start, _)| format_hhmm(start))
}

/// Last time of a range; a lone time is its own end.
pub fn time_range_end(value: &str) -> Option<String> {
    parse_time_range(value).map(|(start, end)| format_hhmm(end.unwrap_or(start)))
}

pub fn parse_time(value: &str) -> Option<String> {
    time::parse_time(value).map(format_hhmm)
}

/// `{format?, time?}` -> ISO-8601 UTC. `time` is usually a reference to a sibling field.
pub fn parse_date(value: &str, args: &TransformArgs, ctx: &TransformContext<'_>) -> Option<String> {
    match ctx
        .formats
        .parse(args.str("format"), value, args.str("time"), ctx.dates)
    {
        Ok(parsed) => Some(parsed.to_iso(ctx.dates)),
        Err(e) => {
            debug!("parse-date: {}", e);
            None
        }
    }
}

/// Combine a time or time range with a separately resolved date.
///
/// Params: `date` (field reference or literal), `format?` for that date and
/// `isEndTime`. An end time earlier than the start hour belongs to the next day.
pub fn date_time(value: &str, args: &TransformArgs, ctx: &TransformContext<'_>) -> Option<String> {
    let Some(date_text) = args.str("date") else {
        debug!("date-time: no date available for '{}'", value);
        return None;
    };
    let date = match ctx.formats.parse(args.str("format"), date_text, None, ctx.dates) {
        Ok(parsed) => parsed.date,
        Err(e) => {
            debug!("date-time: {}", e);
            return None;
        }
    };

    let (start, end) = parse_time_range(value)?;
    let parsed = if args.bool("isEndTime") {
        let end = end?;
        let date = if end.hour() < start.hour() {
            date + Duration::days(1)
        } else {
            date
        };
        ParsedDate::new(date, Some(end))
    } else {
        ParsedDate::new(date, Some(start))
    };
    Some(parsed.to_iso(ctx.dates))
}
