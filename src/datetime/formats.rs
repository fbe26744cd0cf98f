use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::date::{
    parse_compact, parse_date_text, parse_day_month, parse_explicit_year, parse_iso_date,
    parse_relative, parse_weekday_day_month,
};
use super::time::parse_time;
use super::{DateContext, ParsedDate};
use crate::common::error::{Result, ScraperError};

/// Names accepted in `transformParams.format`, `dateGroups.format` and as `dateFormats` targets.
pub const BUILTIN_FORMATS: &[&str] = &[
    "auto",
    "relative",
    "weekday-day-month",
    "day-month",
    "compact",
    "explicit-year",
    "iso",
];

/// A date parsing strategy selected by a format discriminator.
///
/// `time_hint` is a separately scraped time (a doors line, a time column) that
/// applies when the date text carries no time of its own.
pub trait DateFormat: Send + Sync {
    fn parse(&self, text: &str, time_hint: Option<&str>, ctx: &DateContext) -> Result<ParsedDate>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFormat {
    Auto,
    Relative,
    WeekdayDayMonth,
    DayMonth,
    Compact,
    ExplicitYear,
    Iso,
}

impl BuiltinFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "auto" => Some(Self::Auto),
            "relative" => Some(Self::Relative),
            "weekday-day-month" => Some(Self::WeekdayDayMonth),
            "day-month" => Some(Self::DayMonth),
            "compact" => Some(Self::Compact),
            "explicit-year" => Some(Self::ExplicitYear),
            "iso" => Some(Self::Iso),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Relative => "relative",
            Self::WeekdayDayMonth => "weekday-day-month",
            Self::DayMonth => "day-month",
            Self::Compact => "compact",
            Self::ExplicitYear => "explicit-year",
            Self::Iso => "iso",
        }
    }
}

impl DateFormat for BuiltinFormat {
    fn parse(&self, text: &str, time_hint: Option<&str>, ctx: &DateContext) -> Result<ParsedDate> {
        let parsed = match self {
            Self::Auto => parse_date_text(text, ctx),
            Self::Relative => parse_relative(text, ctx.today),
            Self::WeekdayDayMonth => parse_weekday_day_month(text, ctx.today),
            Self::DayMonth => parse_day_month(text, ctx.today),
            Self::Compact => parse_compact(text, ctx.today),
            // The doors time wins over anything trailing the date
            Self::ExplicitYear => parse_explicit_year(text, time_hint),
            Self::Iso => parse_iso_date(text, ctx),
        };

        parsed
            .map(|date| date.or_time(time_hint.and_then(parse_time)))
            .ok_or_else(|| ScraperError::DateParsing {
                text: text.to_string(),
                reason: format!("not a '{}' date", self.name()),
            })
    }
}

/// Format discriminator -> parser. Built-ins are always present; config
/// `dateFormats` aliases are added when a run starts.
pub struct DateFormatRegistry {
    formats: HashMap<String, Arc<dyn DateFormat>>,
}

impl DateFormatRegistry {
    pub fn new() -> Self {
        let mut formats: HashMap<String, Arc<dyn DateFormat>> = HashMap::new();
        for name in BUILTIN_FORMATS {
            if let Some(format) = BuiltinFormat::from_name(name) {
                formats.insert(name.to_string(), Arc::new(format));
            }
        }
        Self { formats }
    }

    /// Built-ins plus site aliases such as `"thekla": "compact"`.
    pub fn from_aliases(aliases: &BTreeMap<String, String>) -> Result<Self> {
        let mut registry = Self::new();
        for (alias, target) in aliases {
            let format = registry.get(target).ok_or_else(|| {
                ScraperError::Config(format!(
                    "date format alias '{alias}' targets unknown format '{target}'"
                ))
            })?;
            registry.formats.insert(alias.clone(), format);
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, format: Arc<dyn DateFormat>) {
        self.formats.insert(name.into(), format);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DateFormat>> {
        self.formats.get(name).cloned()
    }

    /// Parse with the named format, `auto` when no name is given.
    pub fn parse(
        &self,
        format: Option<&str>,
        text: &str,
        time_hint: Option<&str>,
        ctx: &DateContext,
    ) -> Result<ParsedDate> {
        let name = format.unwrap_or("auto");
        let parser = self.get(name).ok_or_else(|| ScraperError::DateParsing {
            text: text.to_string(),
            reason: format!("unknown date format '{name}'"),
        })?;
        parser.parse(text, time_hint, ctx)
    }

    pub fn list_formats(&self) -> Vec<&str> {
        self.formats.keys().map(|k| k.as_str()).collect()
    }
}

impl Default for DateFormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn ctx() -> DateContext {
        DateContext::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
    }

    #[test]
    fn test_registry_has_builtin_formats() {
        let registry = DateFormatRegistry::new();
        let formats = registry.list_formats();
        for name in BUILTIN_FORMATS {
            assert!(formats.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_alias_resolves_to_builtin() {
        let mut aliases = BTreeMap::new();
        aliases.insert("thekla".to_string(), "compact".to_string());
        let registry = DateFormatRegistry::from_aliases(&aliases).unwrap();

        let parsed = registry.parse(Some("thekla"), "Wed.13.Aug.25", None, &ctx()).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2025, 8, 13).unwrap());
    }

    #[test]
    fn test_alias_to_unknown_format_fails() {
        let mut aliases = BTreeMap::new();
        aliases.insert("x".to_string(), "nope".to_string());
        assert!(DateFormatRegistry::from_aliases(&aliases).is_err());
    }

    #[test]
    fn test_time_hint_fills_missing_time() {
        let registry = DateFormatRegistry::new();
        let parsed = registry
            .parse(Some("day-month"), "11 August", Some("Doors: 7:30pm"), &ctx())
            .unwrap();
        assert_eq!(parsed.time, NaiveTime::from_hms_opt(19, 30, 0));
    }

    #[test]
    fn test_failure_is_a_date_parsing_error() {
        let registry = DateFormatRegistry::new();
        let err = registry.parse(None, "Valentines day", None, &ctx()).unwrap_err();
        assert!(matches!(err, ScraperError::DateParsing { .. }));
    }
}
