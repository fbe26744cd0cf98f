//! Final checks on a run's normalized batch.

use serde_json::Value;
use tracing::{info, warn};

use crate::common::error::{Result, ScraperError};
use crate::config::ValidationRules;
use crate::domain::Gig;

pub struct ResultValidator<'a> {
    rules: &'a ValidationRules,
}

impl<'a> ResultValidator<'a> {
    pub fn new(rules: &'a ValidationRules) -> Self {
        Self { rules }
    }

    /// Too few results or a missing required value fails the batch; too many only warns.
    pub fn validate(&self, gigs: &[Gig]) -> Result<()> {
        let count = gigs.len();

        if let Some(min) = self.rules.min_events_expected {
            if count < min {
                return Err(ScraperError::ResultValidation(format!(
                    "expected at least {min} events, got {count} ({count} of {min}); the site markup may have changed"
                )));
            }
        }

        if let Some(max) = self.rules.max_events_expected {
            if count > max {
                warn!("Got {} events, more than the {} expected", count, max);
            }
        }

        for gig in gigs {
            let record = serde_json::to_value(gig)?;
            for path in &self.rules.required {
                if !lookup(&record, path).map_or(false, is_truthy) {
                    return Err(ScraperError::ResultValidation(format!(
                        "record {} is missing required field '{}'",
                        gig.id, path
                    )));
                }
            }
        }

        info!("Validated {} event(s)", count);
        Ok(())
    }
}

/// Follow a dot path such as `venue.name` through objects (and array indices).
fn lookup<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{gig_id, GigStatus, Venue};
    use serde_json::json;

    fn gig(title: &str) -> Gig {
        Gig {
            id: gig_id("Thekla", title, "2025-08-13T19:30:00.000Z", None),
            source: "thekla".into(),
            source_id: None,
            title: title.into(),
            artists: vec![],
            venue: Venue {
                name: "Thekla".into(),
                address: None,
                city: None,
                country: None,
                lat: None,
                lng: None,
            },
            date_start: "2025-08-13T19:30:00.000Z".into(),
            date_end: None,
            timezone: None,
            event_url: None,
            tickets_url: None,
            images: vec![],
            genre: vec![],
            age_restriction: None,
            description: None,
            status: GigStatus::Scheduled,
            hash: "abc".into(),
            updated_at: "2025-08-01T00:00:00.000Z".into(),
        }
    }

    fn validation_rules(min: Option<usize>, max: Option<usize>, required: &[&str]) -> ValidationRules {
        ValidationRules {
            min_events_expected: min,
            max_events_expected: max,
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_shortfall_is_fatal_and_names_counts() {
        let rules = validation_rules(Some(5), None, &[]);
        let err = ResultValidator::new(&rules)
            .validate(&[gig("a"), gig("b")])
            .unwrap_err();
        assert!(matches!(err, ScraperError::ResultValidation(_)));
        assert!(err.to_string().contains("2 of 5"), "{err}");
    }

    #[test]
    fn test_excess_only_warns() {
        let rules = validation_rules(Some(1), Some(1), &[]);
        assert!(ResultValidator::new(&rules).validate(&[gig("a"), gig("b")]).is_ok());
    }

    #[test]
    fn test_missing_required_path_names_record() {
        let rules = validation_rules(None, None, &["title", "venue.city"]);
        let g = gig("a");
        let err = ResultValidator::new(&rules).validate(&[g.clone()]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&g.id), "{message}");
        assert!(message.contains("venue.city"), "{message}");
    }

    #[test]
    fn test_empty_values_are_not_truthy() {
        let rules = validation_rules(None, None, &["title"]);
        assert!(ResultValidator::new(&rules).validate(&[gig("")]).is_err());

        let rules = validation_rules(None, None, &["artists"]);
        assert!(ResultValidator::new(&rules).validate(&[gig("a")]).is_err());
    }

    #[test]
    fn test_lookup_walks_dot_paths() {
        let value = json!({ "venue": { "name": "Thekla" }, "images": ["a.jpg"] });
        assert_eq!(lookup(&value, "venue.name"), Some(&json!("Thekla")));
        assert_eq!(lookup(&value, "images.0"), Some(&json!("a.jpg")));
        assert_eq!(lookup(&value, "venue.city"), None);
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!({})));
    }
}
