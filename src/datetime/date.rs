use chrono::{Duration, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use super::time::{parse_time, split_range};
use super::year::{resolve_date, resolve_short_year};
use super::{parse_iso, DateContext, ParsedDate};

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

const WEEKDAYS: [&str; 7] = [
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RELATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(today|tonight|tomorrow)\b\s*(.*)$").unwrap());

static WEEKDAY_DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]+)\.?\s+(\d{1,2})\s+([a-z]+)\.?(?:\s+(\d{4}))?\b\s*(.*)$").unwrap()
});

static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})\s+([a-z]+)\.?(?:\s+(\d{4}))?\b\s*(.*)$").unwrap()
});

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]+)\.?\s+(\d{1,2})(?:\s+(\d{4}))?\b\s*(.*)$").unwrap()
});

/// `Wed.13.Aug.25`
static COMPACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:[a-z]+\.\s*)?(\d{1,2})\.([a-z]+)\.(\d{4}|\d{2})\b\s*(.*)$").unwrap()
});

/// `12 Aug 2025`, optionally behind a weekday
static EXPLICIT_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z]+\.?\s+)?(\d{1,2})\s+([a-z]+)\.?\s+(\d{4})\b\s*(.*)$").unwrap()
});

/// Lowercase, drop commas and ordinal suffixes, collapse whitespace.
pub fn normalize_date_text(text: &str) -> String {
    let lowered = text.to_lowercase().replace(',', " ");
    let without_ordinals = ORDINAL.replace_all(&lowered, "$1");
    WHITESPACE
        .replace_all(without_ordinals.trim(), " ")
        .into_owned()
}

pub fn month_from_name(name: &str) -> Option<u32> {
    let name = name.trim_end_matches('.');
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(name))
        .map(|i| i as u32 + 1)
}

pub fn is_weekday(name: &str) -> bool {
    let name = name.trim_end_matches('.');
    name.len() >= 3 && WEEKDAYS.iter().any(|w| w.starts_with(name))
}

/// Time trailing a date. A trailing range (`20:00 - 23:00`) is discarded.
fn trailing_time(rest: &str) -> Option<NaiveTime> {
    let rest = rest.trim_start_matches(|c: char| c == '@' || c == '|' || c.is_whitespace());
    if rest.is_empty() {
        return None;
    }
    match split_range(rest) {
        ("", Some(end)) => parse_time(end),
        (_, Some(_)) => None,
        (single, None) => parse_time(single),
    }
}

fn parse_year(text: Option<&str>) -> Option<i32> {
    let digits = text?;
    let year: i32 = digits.parse().ok()?;
    Some(if digits.len() == 2 { 2000 + year } else { year })
}

/// `Today`, `Tonight 8pm`, `Tomorrow 19:30`
pub fn parse_relative(text: &str, today: NaiveDate) -> Option<ParsedDate> {
    let norm = normalize_date_text(text);
    let caps = RELATIVE.captures(&norm)?;
    let date = match caps.get(1)?.as_str() {
        "tomorrow" => today + Duration::days(1),
        _ => today,
    };
    let time = caps.get(2).and_then(|rest| trailing_time(rest.as_str()));
    Some(ParsedDate::new(date, time))
}

/// `Monday 11th August`, `Mon 11 Aug 19:30`, `Fri 3rd Oct 20:00 - 23:00`
pub fn parse_weekday_day_month(text: &str, today: NaiveDate) -> Option<ParsedDate> {
    let norm = normalize_date_text(text);
    let caps = WEEKDAY_DAY_MONTH.captures(&norm)?;
    if !is_weekday(caps.get(1)?.as_str()) {
        return None;
    }
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;
    let month = month_from_name(caps.get(3)?.as_str())?;
    let year = parse_year(caps.get(4).map(|m| m.as_str()));
    let date = resolve_date(year, month, day, today)?;
    let time = caps.get(5).and_then(|rest| trailing_time(rest.as_str()));
    Some(ParsedDate::new(date, time))
}

/// `11 August`, `11th Aug 2025`, and the month-first `Aug 29`
pub fn parse_day_month(text: &str, today: NaiveDate) -> Option<ParsedDate> {
    let norm = normalize_date_text(text);
    let (day, month, year, rest) = if let Some(caps) = DAY_MONTH.captures(&norm) {
        (
            caps.get(1)?.as_str().parse::<u32>().ok()?,
            month_from_name(caps.get(2)?.as_str())?,
            parse_year(caps.get(3).map(|m| m.as_str())),
            caps.get(4).map(|m| m.as_str().to_string()),
        )
    } else {
        let caps = MONTH_DAY.captures(&norm)?;
        (
            caps.get(2)?.as_str().parse::<u32>().ok()?,
            month_from_name(caps.get(1)?.as_str())?,
            parse_year(caps.get(3).map(|m| m.as_str())),
            caps.get(4).map(|m| m.as_str().to_string()),
        )
    };
    let date = resolve_date(year, month, day, today)?;
    let time = rest.as_deref().and_then(trailing_time);
    Some(ParsedDate::new(date, time))
}

/// `Wed.13.Aug.25`; two-digit years are 20xx unless that lands implausibly far out.
pub fn parse_compact(text: &str, today: NaiveDate) -> Option<ParsedDate> {
    let caps = COMPACT.captures(text)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = month_from_name(&caps.get(2)?.as_str().to_lowercase())?;
    let digits = caps.get(3)?.as_str();
    let year: i32 = digits.parse().ok()?;
    let date = if digits.len() == 2 {
        resolve_short_year(year, month, day, today)?
    } else {
        NaiveDate::from_ymd_opt(year, month, day)?
    };
    let time = caps.get(4).and_then(|rest| trailing_time(rest.as_str()));
    Some(ParsedDate::new(date, time))
}

/// `12 Aug 2025` with the doors time printed elsewhere on the listing.
pub fn parse_explicit_year(text: &str, doors: Option<&str>) -> Option<ParsedDate> {
    let norm = normalize_date_text(text);
    let caps = EXPLICIT_YEAR.captures(&norm)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = month_from_name(caps.get(2)?.as_str())?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = doors
        .and_then(parse_time)
        .or_else(|| caps.get(4).and_then(|rest| trailing_time(rest.as_str())));
    Some(ParsedDate::new(date, time))
}

/// `2025-08-13`, `2025-08-13 19:30`, or a full RFC 3339 timestamp (kept as venue wall clock).
pub fn parse_iso_date(text: &str, ctx: &DateContext) -> Option<ParsedDate> {
    let text = text.trim();
    if let Some(dt) = parse_iso(text) {
        let local = match ctx.timezone {
            Some(tz) => dt.with_timezone(&tz).naive_local(),
            None => dt.naive_utc(),
        };
        return Some(ParsedDate::new(local.date(), Some(local.time())));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(text, format) {
            return Some(ParsedDate::new(dt.date(), Some(dt.time())));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| ParsedDate::new(date, None))
}

/// The canonical parser: every generic shape, most specific first.
pub fn parse_date_text(text: &str, ctx: &DateContext) -> Option<ParsedDate> {
    parse_relative(text, ctx.today)
        .or_else(|| parse_iso_date(text, ctx))
        .or_else(|| parse_compact(text, ctx.today))
        .or_else(|| parse_weekday_day_month(text, ctx.today))
        .or_else(|| parse_day_month(text, ctx.today))
}
