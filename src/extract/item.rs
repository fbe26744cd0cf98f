use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One extracted value: a single string, or an ordered list for `multiple` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Many(Vec<String>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Single(s) => s.trim().is_empty(),
            FieldValue::Many(values) => values.iter().all(|v| v.trim().is_empty()),
        }
    }

    /// The value as one string; lists yield their first entry.
    pub fn first(&self) -> Option<&str> {
        match self {
            FieldValue::Single(s) => Some(s.as_str()),
            FieldValue::Many(values) => values.first().map(String::as_str),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            FieldValue::Single(s) => vec![s.clone()],
            FieldValue::Many(values) => values.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Single(s) => Value::String(s.clone()),
            FieldValue::Many(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Single(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Single(s.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::Many(values)
    }
}

/// Raw record built per container during one run.
pub type ExtractedItem = BTreeMap<String, FieldValue>;

/// Item title for log lines.
pub fn item_label(item: &ExtractedItem) -> &str {
    item.get("title")
        .and_then(FieldValue::first)
        .unwrap_or("<untitled>")
}
