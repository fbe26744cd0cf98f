//! Named value transforms applied to extracted fields and mapping values.
//!
//! The registry is open: unknown names pass values through unchanged with a
//! warning, and callers may [`TransformRegistry::register`] site-specific
//! transforms before a run.

pub mod dates;
pub mod generic;
pub mod links;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::config::TransformParams;
use crate::datetime::{DateContext, DateFormatRegistry};
use crate::extract::{ExtractedItem, FieldValue};

/// Transform names the registry ships with.
pub const BUILTIN_TRANSFORMS: &[&str] = &[
    "trim",
    "lowercase",
    "uppercase",
    "slug",
    "extract-text",
    "regex",
    "time-range-start",
    "time-range-end",
    "url",
    "parse-date",
    "parse-time",
    "date-time",
];

/// Params holding literals rather than field references.
const LITERAL_PARAMS: &[&str] = &[
    "format",
    "pattern",
    "replacement",
    "group",
    "fragmentPath",
    "isEndTime",
];

/// Everything a transform may need besides the value.
pub struct TransformContext<'a> {
    pub base_url: &'a str,
    pub dates: &'a DateContext,
    pub formats: &'a DateFormatRegistry,
}

/// Transform parameters after field references have been substituted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformArgs(BTreeMap<String, Value>);

impl TransformArgs {
    /// Substitute string params that name an item field with that field's value.
    /// `is_field` tells which names are fields at all; declared fields that
    /// have no value yet resolve to null.
    pub fn resolve<F>(params: Option<&TransformParams>, item: &ExtractedItem, is_field: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let Some(params) = params else {
            return Self::default();
        };
        let resolved = params
            .iter()
            .map(|(key, value)| {
                let value = match value.as_str() {
                    Some(name) if !LITERAL_PARAMS.contains(&key.as_str()) => {
                        match item.get(name) {
                            Some(field) => field.to_json(),
                            None if is_field(name) => Value::Null,
                            None => value.clone(),
                        }
                    }
                    _ => value.clone(),
                };
                (key.clone(), value)
            })
            .collect();
        Self(resolved)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.as_str()),
            Value::Array(values) => values.first().and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn bool(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn usize(&self, key: &str) -> Option<usize> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<BTreeMap<String, Value>> for TransformArgs {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// A named string transform. `None` means "no value".
pub trait Transform: Send + Sync {
    fn apply(&self, value: &str, args: &TransformArgs, ctx: &TransformContext<'_>) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTransform {
    Trim,
    Lowercase,
    Uppercase,
    Slug,
    ExtractText,
    Regex,
    TimeRangeStart,
    TimeRangeEnd,
    Url,
    ParseDate,
    ParseTime,
    DateTime,
}

impl BuiltinTransform {
    pub fn from_name(name: &str) -> Option<Self> {
        let transform = match name {
            "trim" => Self::Trim,
            "lowercase" => Self::Lowercase,
            "uppercase" => Self::Uppercase,
            "slug" => Self::Slug,
            "extract-text" => Self::ExtractText,
            "regex" => Self::Regex,
            "time-range-start" => Self::TimeRangeStart,
            "time-range-end" => Self::TimeRangeEnd,
            "url" => Self::Url,
            "parse-date" => Self::ParseDate,
            "parse-time" => Self::ParseTime,
            "date-time" => Self::DateTime,
            _ => return None,
        };
        Some(transform)
    }
}

impl Transform for BuiltinTransform {
    fn apply(&self, value: &str, args: &TransformArgs, ctx: &TransformContext<'_>) -> Option<String> {
        match self {
            Self::Trim => generic::trim(value),
            Self::Lowercase => Some(value.to_lowercase()),
            Self::Uppercase => Some(value.to_uppercase()),
            Self::Slug => generic::slug(value),
            Self::ExtractText => generic::extract_text(value, args),
            Self::Regex => generic::regex_replace(value, args),
            Self::TimeRangeStart => dates::time_range_start(value),
            Self::TimeRangeEnd => dates::time_range_end(value),
            Self::Url => links::resolve_url(value, ctx.base_url, args.str("fragmentPath")),
            Self::ParseDate => dates::parse_date(value, args, ctx),
            Self::ParseTime => dates::parse_time(value),
            Self::DateTime => dates::date_time(value, args, ctx),
        }
    }
}

/// Name -> transform lookup, prepopulated with the built-ins.
pub struct TransformRegistry {
    transforms: HashMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        let mut transforms: HashMap<String, Arc<dyn Transform>> = HashMap::new();
        for name in BUILTIN_TRANSFORMS {
            if let Some(transform) = BuiltinTransform::from_name(name) {
                transforms.insert(name.to_string(), Arc::new(transform));
            }
        }
        Self { transforms }
    }

    /// Register a transform, replacing any existing one of the same name.
    pub fn register(&mut self, name: impl Into<String>, transform: Arc<dyn Transform>) {
        self.transforms.insert(name.into(), transform);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn list_transforms(&self) -> Vec<&str> {
        self.transforms.keys().map(|k| k.as_str()).collect()
    }

    /// Run `name` over a value. Lists are mapped element-wise and entries
    /// without a result are dropped.
    pub fn apply(
        &self,
        name: &str,
        value: FieldValue,
        args: &TransformArgs,
        ctx: &TransformContext<'_>,
    ) -> Option<FieldValue> {
        let Some(transform) = self.transforms.get(name) else {
            warn!("Unknown transform '{}'; passing value through unchanged", name);
            return Some(value);
        };

        match value {
            FieldValue::Single(s) => transform.apply(&s, args, ctx).map(FieldValue::Single),
            FieldValue::Many(values) => Some(FieldValue::Many(
                values
                    .iter()
                    .filter_map(|v| transform.apply(v, args, ctx))
                    .collect(),
            )),
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}
