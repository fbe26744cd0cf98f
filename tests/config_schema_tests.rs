use jsonschema::JSONSchema;
use serde_json::json;
use std::fs;

use gig_scraper::config::scaffold::{inject_defaults, template};
use gig_scraper::config::{load_config, parse_config, validate_value};
use gig_scraper::ScraperError;

fn compiled_schema() -> JSONSchema {
    let schema = include_str!("../schemas/scraper_config.v1.json");
    let schema_json: serde_json::Value = serde_json::from_str(schema).unwrap();
    let schema_static: &'static serde_json::Value = Box::leak(Box::new(schema_json));
    JSONSchema::options().compile(schema_static).unwrap()
}

#[test]
fn shipped_configs_match_schema() {
    let compiled = compiled_schema();
    let mut checked = 0;
    for entry in fs::read_dir("configs").unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let instance: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(compiled.is_valid(&instance), "{} fails the schema", path.display());
        checked += 1;
    }
    assert!(checked >= 3);
}

#[test]
fn shipped_configs_load() {
    for name in ["thekla", "the-fleece", "the-exchange"] {
        let config = load_config(format!("configs/{name}.json")).unwrap();
        assert_eq!(config.site.source, name);
        assert_eq!(config.site.timezone.as_deref(), Some("Europe/London"));
    }
}

#[test]
fn unknown_action_type_is_rejected() {
    let compiled = compiled_schema();
    let instance = json!({
        "site": { "name": "X", "source": "x", "baseUrl": "https://x.com" },
        "workflow": [{ "type": "teleport" }],
        "mapping": { "title": "title", "venue": { "name": "X" }, "dateStart": "date" }
    });
    assert!(!compiled.is_valid(&instance));

    let errors = validate_value(&instance).unwrap();
    assert!(errors.iter().any(|e| e.starts_with("/workflow/0")), "{errors:?}");
}

#[test]
fn unknown_top_level_key_is_rejected() {
    let instance = json!({
        "site": { "name": "X", "source": "x", "baseUrl": "https://x.com" },
        "workflow": [{ "type": "navigate", "url": "/" }],
        "mapping": { "title": "title", "venue": { "name": "X" }, "dateStart": "date" },
        "schedule": "hourly"
    });
    match parse_config(&instance.to_string()) {
        Err(ScraperError::ConfigValidation { errors }) => assert!(!errors.is_empty()),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn scaffolded_template_is_valid() {
    let config = template("The Louisiana", "https://www.thelouisiana.net/", None);
    let parsed = parse_config(&config.to_string()).unwrap();
    assert_eq!(parsed.site.source, "the-louisiana");
    assert_eq!(parsed.site.base_url, "https://www.thelouisiana.net");
}

#[test]
fn fixing_fills_missing_blocks_only() {
    let mut config = json!({
        "site": { "name": "X", "source": "x", "baseUrl": "https://x.com" },
        "rateLimit": { "delayBetweenRequests": 250 },
        "workflow": [{ "type": "navigate", "url": "/" }],
        "mapping": { "title": "title", "venue": { "name": "X" }, "dateStart": "date" }
    });
    let added = inject_defaults(&mut config);
    assert_eq!(added, vec!["browser", "validation"]);
    assert_eq!(config["rateLimit"]["delayBetweenRequests"], 250);

    let parsed = parse_config(&config.to_string()).unwrap();
    assert_eq!(parsed.validation.required, vec!["title", "dateStart", "venue.name"]);
}
