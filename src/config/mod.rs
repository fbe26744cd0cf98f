//! Site configuration model.
//!
//! A [`ScraperConfig`] is loaded once per run from JSON (camelCase keys) and is
//! immutable afterwards. Optional blocks fall back to the defaults in
//! [`crate::common::constants`].

pub mod loader;
pub mod scaffold;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::constants::{
    DEFAULT_DELAY_BETWEEN_REQUESTS_MS, DEFAULT_MAX_CONCURRENCY, DEFAULT_MIN_EVENTS_EXPECTED,
    DEFAULT_TIMEOUT_MS, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH,
};

pub use loader::{load_config, parse_config, validate_value};

/// Parameters handed to a transform. String values naming an extracted field
/// are resolved to that field's value before the transform runs.
pub type TransformParams = BTreeMap<String, Value>;

fn is_false(b: &bool) -> bool {
    !*b
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperConfig {
    pub site: SiteConfig,
    #[serde(default)]
    pub browser: BrowserOptions,
    #[serde(default)]
    pub rate_limit: RateLimitPolicy,
    pub workflow: Vec<ActionConfig>,
    pub mapping: MappingConfig,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default)]
    pub debug: DebugOptions,
    /// Site-specific date format aliases, e.g. `"thekla": "compact"`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub date_formats: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub name: String,
    pub source: String,
    pub base_url: String,
    /// IANA zone the venue publishes its times in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserOptions {
    #[serde(default)]
    pub viewport: Viewport,
    /// Default timeout in milliseconds for navigation and waits
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default = "default_true")]
    pub headless: bool,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            timeout: DEFAULT_TIMEOUT_MS,
            user_agent: None,
            headless: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    /// Politeness delay in milliseconds between actions and follow-up visits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_between_requests: Option<u64>,
    /// Upper bound for schedulers running this site; the engine itself is sequential
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
    #[serde(default = "default_true")]
    pub respect_robots: bool,
}

fn default_max_concurrency() -> u32 {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            delay_between_requests: Some(DEFAULT_DELAY_BETWEEN_REQUESTS_MS),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            respect_robots: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_events_expected: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_events_expected: Option<usize>,
    /// Dot-notation paths into the Gig, e.g. `venue.name`
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_events_expected: Some(DEFAULT_MIN_EVENTS_EXPECTED),
            max_events_expected: None,
            required: vec!["title".to_string(), "dateStart".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugOptions {
    #[serde(default)]
    pub screenshots: bool,
    #[serde(default)]
    pub html: bool,
    /// Where artifacts go; the working directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

impl DebugOptions {
    pub fn enabled(&self) -> bool {
        self.screenshots || self.html
    }
}

/// One step of the workflow, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionConfig {
    Navigate(NavigateAction),
    Wait(WaitAction),
    Click(ClickAction),
    Scroll(ScrollAction),
    Extract(ExtractAction),
}

impl ActionConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionConfig::Navigate(_) => "navigate",
            ActionConfig::Wait(_) => "wait",
            ActionConfig::Click(_) => "click",
            ActionConfig::Scroll(_) => "scroll",
            ActionConfig::Extract(_) => "extract",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateAction {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_load: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitCondition {
    #[default]
    Visible,
    Hidden,
    Networkidle,
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaitCondition::Visible => "visible",
            WaitCondition::Hidden => "hidden",
            WaitCondition::Networkidle => "networkidle",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub condition: WaitCondition,
    /// Milliseconds; falls back to `browser.timeout`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickAction {
    pub selector: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_after: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollAction {
    #[serde(default)]
    pub direction: ScrollDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_after: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractAction {
    pub container_selector: String,
    pub fields: BTreeMap<String, FieldConfig>,
    /// Applied to every item extracted by this action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<FollowUpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_groups: Option<DateGroupConfig>,
}

/// Flat heading/event layouts: each heading's date applies to the events after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateGroupConfig {
    pub heading_selector: String,
    pub event_selector: String,
    /// Date format used for heading text; `auto` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Which part of a node a field reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Attribute {
    #[default]
    Text,
    Href,
    Src,
    InnerHtml,
    Custom(String),
}

impl From<String> for Attribute {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => Attribute::Text,
            "href" => Attribute::Href,
            "src" => Attribute::Src,
            "innerHTML" => Attribute::InnerHtml,
            _ => Attribute::Custom(s),
        }
    }
}

impl From<Attribute> for String {
    fn from(a: Attribute) -> Self {
        match a {
            Attribute::Text => "text".to_string(),
            Attribute::Href => "href".to_string(),
            Attribute::Src => "src".to_string(),
            Attribute::InnerHtml => "innerHTML".to_string(),
            Attribute::Custom(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    /// Relative to the container; the container itself when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub attribute: Attribute,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_params: Option<TransformParams>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<FollowUpConfig>,
}

impl FieldConfig {
    /// Sibling field names this field's transform params refer to.
    pub fn param_references<'a>(
        &'a self,
        siblings: &'a BTreeMap<String, FieldConfig>,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.transform_params
            .iter()
            .flat_map(|params| params.values())
            .filter_map(|v| v.as_str())
            .filter(move |name| siblings.contains_key(*name))
    }
}

/// Secondary page visit. Follow-up fields may not declare follow-ups themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpConfig {
    /// Item field holding the URL; the declaring field when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_field: Option<String>,
    pub fields: BTreeMap<String, FieldConfig>,
}

/// How extracted items become Gigs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfig {
    pub title: MappingValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists: Option<MappingValue>,
    pub venue: VenueMapping,
    pub date_start: MappingValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_end: Option<MappingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<MappingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_url: Option<MappingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickets_url: Option<MappingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<MappingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<MappingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_restriction: Option<MappingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<MappingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MappingValue>,
}

/// Either a plain field reference or `{field, transform, transformParams}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingValue {
    Field(String),
    Transformed(TransformedMapping),
}

impl MappingValue {
    pub fn field(&self) -> &str {
        match self {
            MappingValue::Field(name) => name,
            MappingValue::Transformed(t) => &t.field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedMapping {
    pub field: String,
    pub transform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_params: Option<TransformParams>,
}

/// Venue values name an extracted field when one exists, otherwise they are literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueMapping {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Fixed(f64),
    Field(String),
}
