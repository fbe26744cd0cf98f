use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;

static DOORS_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*doors?(?:\s+open)?\s*[:\-]?\s*").unwrap());

static TIME_12H: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:[:.](\d{2}))?\s*([ap])\.?\s*m\b\.?").unwrap()
});

static TIME_24H: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3])[:.]([0-5]\d)\b").unwrap());

/// An hour with no am/pm of its own, as in the `7` of `7-11pm`
static BARE_HOUR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})(?:[:.](\d{2}))?$").unwrap());

/// Dash variants used between the two ends of a range
static RANGE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:[-\u{2013}\u{2014}]|\bto\b|\buntil\b)\s*").unwrap());

/// Parse a listing time: `19:30`, `7.30pm`, `7 PM`, `Doors: 07:00`, or the start of `20:00 - 23:00`.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let cleaned = DOORS_PREFIX.replace(text.trim(), "");
    let (start, end) = split_range(&cleaned);
    parse_range_start(start, end)
}

/// First time found in the text, 12-hour forms taking precedence over bare `HH:MM`.
pub fn parse_single_time(text: &str) -> Option<NaiveTime> {
    if let Some(caps) = TIME_12H.captures(text) {
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
        if !(1..=12).contains(&hour) {
            return None;
        }
        let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("p");
        let hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }

    let caps = TIME_24H.captures(text)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2)?.as_str().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Split `a - b` into its ends. Texts without a separator come back as `(text, None)`.
pub fn split_range(text: &str) -> (&str, Option<&str>) {
    match RANGE_SEPARATOR.find(text) {
        Some(m) => {
            let end = text[m.end()..].trim();
            (text[..m.start()].trim(), (!end.is_empty()).then_some(end))
        }
        None => (text.trim(), None),
    }
}

/// Both ends of a time range such as `13:00 - 14:45`. The end is `None` when there is no range.
pub fn parse_time_range(text: &str) -> Option<(NaiveTime, Option<NaiveTime>)> {
    let cleaned = DOORS_PREFIX.replace(text.trim(), "");
    let (start, end) = split_range(&cleaned);
    let start_time = parse_range_start(start, end)?;
    let end_time = end.and_then(|e| parse_single_time(last_segment(e)));
    Some((start_time, end_time))
}

/// A bare start hour takes the meridiem of the range end.
fn parse_range_start(start: &str, end: Option<&str>) -> Option<NaiveTime> {
    let meridiem = end
        .filter(|_| BARE_HOUR.is_match(start))
        .and_then(|e| TIME_12H.captures(e))
        .and_then(|caps| caps.get(3));
    match meridiem {
        Some(m) => parse_single_time(&format!("{start}{}m", m.as_str())),
        None => parse_single_time(start),
    }
}

fn last_segment(text: &str) -> &str {
    let mut rest = text;
    while let (_, Some(next)) = split_range(rest) {
        rest = next;
    }
    rest
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}
