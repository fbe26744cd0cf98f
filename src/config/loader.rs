use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ActionConfig, FieldConfig, ScraperConfig, WaitCondition};
use crate::common::error::{Result, ScraperError};
use crate::datetime::formats::BUILTIN_FORMATS;
use crate::transform::BUILTIN_TRANSFORMS;

pub const CONFIG_SCHEMA_JSON: &str = include_str!("../../schemas/scraper_config.v1.json");

static CONFIG_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(CONFIG_SCHEMA_JSON).expect("embedded config schema is valid JSON")
});

/// Read, schema-validate and parse a site configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ScraperConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;
    debug!("Loaded config file {}", path.display());
    parse_config(&content)
}

/// Parse a configuration from JSON text. Every problem found is reported at once.
pub fn parse_config(json: &str) -> Result<ScraperConfig> {
    let value: Value = serde_json::from_str(json).map_err(|e| ScraperError::ConfigValidation {
        errors: vec![format!("/: not valid JSON: {e}")],
    })?;

    let schema_errors = validate_value(&value)?;
    if !schema_errors.is_empty() {
        return Err(ScraperError::ConfigValidation {
            errors: schema_errors,
        });
    }

    let config: ScraperConfig =
        serde_json::from_value(value).map_err(|e| ScraperError::ConfigValidation {
            errors: vec![format!("/: {e}")],
        })?;

    let semantic_errors = check_semantics(&config);
    if !semantic_errors.is_empty() {
        return Err(ScraperError::ConfigValidation {
            errors: semantic_errors,
        });
    }

    Ok(config)
}

/// Schema-validate a raw JSON value, returning path-qualified messages.
pub fn validate_value(value: &Value) -> Result<Vec<String>> {
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&CONFIG_SCHEMA)
        .map_err(|e| ScraperError::Config(format!("Failed to compile config schema: {e}")))?;

    let errors = match compiled.validate(value) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|error| {
                let path = error.instance_path.to_string();
                let path = if path.is_empty() { "/".to_string() } else { path };
                format!("{path}: {error}")
            })
            .collect(),
    };
    Ok(errors)
}

/// Checks the schema cannot express.
fn check_semantics(config: &ScraperConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if let Err(e) = url::Url::parse(&config.site.base_url) {
        errors.push(format!("/site/baseUrl: not a valid URL: {e}"));
    }

    if let Some(tz) = &config.site.timezone {
        if chrono_tz::Tz::from_str(tz).is_err() {
            errors.push(format!("/site/timezone: unknown IANA timezone '{tz}'"));
        }
    }

    if let (Some(min), Some(max)) = (
        config.validation.min_events_expected,
        config.validation.max_events_expected,
    ) {
        if min > max {
            errors.push(format!(
                "/validation: minEventsExpected ({min}) exceeds maxEventsExpected ({max})"
            ));
        }
    }

    for (alias, target) in &config.date_formats {
        if !BUILTIN_FORMATS.contains(&target.as_str()) {
            errors.push(format!(
                "/dateFormats/{alias}: '{target}' is not a built-in date format (expected one of {})",
                BUILTIN_FORMATS.join(", ")
            ));
        }
    }

    let mut navigated = false;
    for (index, action) in config.workflow.iter().enumerate() {
        let base = format!("/workflow/{index}");
        match action {
            ActionConfig::Navigate(_) => navigated = true,
            ActionConfig::Wait(wait) => match &wait.selector {
                Some(selector) => check_selector(&format!("{base}/selector"), selector, &mut errors),
                None if wait.condition != WaitCondition::Networkidle => errors.push(format!(
                    "{base}/selector: required for a '{}' wait",
                    wait.condition
                )),
                None => {}
            },
            ActionConfig::Click(click) => {
                check_selector(&format!("{base}/selector"), &click.selector, &mut errors);
            }
            ActionConfig::Scroll(_) => {}
            ActionConfig::Extract(extract) => {
                if !navigated {
                    errors.push(format!(
                        "{base}: extract action appears before any navigate action"
                    ));
                }
                check_selector(
                    &format!("{base}/containerSelector"),
                    &extract.container_selector,
                    &mut errors,
                );
                check_fields(&format!("{base}/fields"), &extract.fields, true, &mut errors);
                if let Some(follow_up) = &extract.follow_up {
                    if follow_up.url_field.is_none() {
                        errors.push(format!(
                            "{base}/followUp/urlField: required when followUp is declared on the action"
                        ));
                    }
                    check_fields(
                        &format!("{base}/followUp/fields"),
                        &follow_up.fields,
                        false,
                        &mut errors,
                    );
                }
                if let Some(groups) = &extract.date_groups {
                    check_selector(
                        &format!("{base}/dateGroups/headingSelector"),
                        &groups.heading_selector,
                        &mut errors,
                    );
                    check_selector(
                        &format!("{base}/dateGroups/eventSelector"),
                        &groups.event_selector,
                        &mut errors,
                    );
                    if let Some(format) = &groups.format {
                        check_date_format(
                            &format!("{base}/dateGroups/format"),
                            format,
                            &config.date_formats,
                            &mut errors,
                        );
                    }
                }
            }
        }
    }

    errors
}

fn check_fields(
    base: &str,
    fields: &BTreeMap<String, FieldConfig>,
    allow_follow_up: bool,
    errors: &mut Vec<String>,
) {
    for (name, field) in fields {
        let path = format!("{base}/{name}");
        if let Some(selector) = &field.selector {
            check_selector(&format!("{path}/selector"), selector, errors);
        }
        if let Some(transform) = &field.transform {
            if !BUILTIN_TRANSFORMS.contains(&transform.as_str()) {
                warn!("{path}/transform: '{transform}' is not built in; it must be registered before the run or values pass through unchanged");
            }
        }
        if let Some(follow_up) = &field.follow_up {
            if allow_follow_up {
                check_fields(&format!("{path}/followUp/fields"), &follow_up.fields, false, errors);
            } else {
                errors.push(format!(
                    "{path}/followUp: follow-up fields cannot declare further follow-ups"
                ));
            }
        }
    }
}

fn check_selector(path: &str, selector: &str, errors: &mut Vec<String>) {
    if let Err(e) = scraper::Selector::parse(selector) {
        errors.push(format!("{path}: invalid CSS selector '{selector}': {e:?}"));
    }
}

fn check_date_format(
    path: &str,
    format: &str,
    aliases: &BTreeMap<String, String>,
    errors: &mut Vec<String>,
) {
    if !BUILTIN_FORMATS.contains(&format) && !aliases.contains_key(format) {
        errors.push(format!("{path}: unknown date format '{format}'"));
    }
}
