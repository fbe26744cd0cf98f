//! Template generation and default injection for the `config` CLI commands.

use serde_json::{json, Map, Value};

use crate::common::constants::{
    DEFAULT_DELAY_BETWEEN_REQUESTS_MS, DEFAULT_MAX_CONCURRENCY, DEFAULT_MIN_EVENTS_EXPECTED,
    DEFAULT_TIMEOUT_MS, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH,
};

/// Turn a site name into a source id / file stem, e.g. "The Fleece" -> "the-fleece".
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// A starter config with placeholder selectors to be filled in by hand.
pub fn template(site_name: &str, base_url: &str, source: Option<&str>) -> Value {
    let source = source.map(str::to_string).unwrap_or_else(|| slugify(site_name));
    let mut config = json!({
        "site": {
            "name": site_name,
            "source": source,
            "baseUrl": base_url.trim_end_matches('/'),
        },
        "workflow": [
            { "type": "navigate", "url": "/whats-on/", "waitForLoad": true },
            { "type": "click", "selector": "#cookie-accept", "optional": true, "waitAfter": 500 },
            { "type": "wait", "selector": ".event-card", "condition": "visible" },
            { "type": "scroll", "direction": "bottom", "waitAfter": 1000 },
            {
                "type": "extract",
                "containerSelector": ".event-card",
                "fields": {
                    "title": { "selector": ".event-card__title", "required": true, "transform": "trim" },
                    "date": {
                        "selector": ".event-card__date",
                        "required": true,
                        "transform": "parse-date",
                        "transformParams": { "format": "auto", "time": "time" }
                    },
                    "time": { "selector": ".event-card__time", "transform": "time-range-start" },
                    "link": { "selector": "a", "attribute": "href", "transform": "url" },
                    "image": { "selector": "img", "attribute": "src", "transform": "url" }
                }
            }
        ],
        "mapping": {
            "title": "title",
            "venue": { "name": site_name },
            "dateStart": "date",
            "eventUrl": "link",
            "images": "image"
        },
        "debug": { "screenshots": false, "html": true }
    });
    inject_defaults(&mut config);
    config
}

/// Fill in the commonly forgotten blocks. Returns the names of blocks that were added.
pub fn inject_defaults(config: &mut Value) -> Vec<&'static str> {
    let mut added = Vec::new();
    let Some(root) = config.as_object_mut() else {
        return added;
    };

    if insert_missing(
        root,
        "browser",
        json!({
            "viewport": { "width": DEFAULT_VIEWPORT_WIDTH, "height": DEFAULT_VIEWPORT_HEIGHT },
            "timeout": DEFAULT_TIMEOUT_MS,
            "headless": true
        }),
    ) {
        added.push("browser");
    }
    if insert_missing(
        root,
        "rateLimit",
        json!({
            "delayBetweenRequests": DEFAULT_DELAY_BETWEEN_REQUESTS_MS,
            "maxConcurrency": DEFAULT_MAX_CONCURRENCY,
            "respectRobots": true
        }),
    ) {
        added.push("rateLimit");
    }
    if insert_missing(
        root,
        "validation",
        json!({
            "minEventsExpected": DEFAULT_MIN_EVENTS_EXPECTED,
            "required": ["title", "dateStart", "venue.name"]
        }),
    ) {
        added.push("validation");
    }
    added
}

fn insert_missing(root: &mut Map<String, Value>, key: &str, value: Value) -> bool {
    if root.contains_key(key) {
        return false;
    }
    root.insert(key.to_string(), value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Fleece & Firkin"), "the-fleece-firkin");
        assert_eq!(slugify("  Thekla "), "thekla");
    }

    #[test]
    fn test_template_is_a_valid_config() {
        let value = template("The Exchange", "https://exchangebristol.com/", None);
        assert_eq!(value["site"]["source"], "the-exchange");
        assert_eq!(value["site"]["baseUrl"], "https://exchangebristol.com");
        parse_config(&value.to_string()).unwrap();
    }

    #[test]
    fn test_inject_defaults_only_adds_missing_blocks() {
        let mut value = serde_json::json!({ "browser": { "timeout": 1000 } });
        let added = inject_defaults(&mut value);
        assert_eq!(added, vec!["rateLimit", "validation"]);
        assert_eq!(value["browser"]["timeout"], 1000);
    }
}
