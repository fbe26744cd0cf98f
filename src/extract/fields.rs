use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::{ExtractedItem, FieldValue};
use crate::config::{Attribute, FieldConfig, FollowUpConfig};
use crate::transform::{TransformArgs, TransformContext, TransformRegistry};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// A secondary page visit requested by one item.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFollowUp<'c> {
    pub url: String,
    pub config: &'c FollowUpConfig,
}

/// An item plus the follow-ups its fields asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<'c> {
    pub item: ExtractedItem,
    pub follow_ups: Vec<PendingFollowUp<'c>>,
}

/// Applies field configs to DOM containers.
pub struct FieldExtractor<'a> {
    transforms: &'a TransformRegistry,
    ctx: &'a TransformContext<'a>,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(transforms: &'a TransformRegistry, ctx: &'a TransformContext<'a>) -> Self {
        Self { transforms, ctx }
    }

    /// Extract every field into `item`, which may already hold values (date groups).
    /// Returns the follow-ups requested by field-level `followUp` blocks.
    pub fn extract_into<'c>(
        &self,
        container: ElementRef,
        fields: &'c BTreeMap<String, FieldConfig>,
        item: &mut ExtractedItem,
    ) -> Vec<PendingFollowUp<'c>> {
        for name in field_order(fields) {
            if let Some(config) = fields.get(name) {
                self.extract_field(container, name, config, fields, item);
            }
        }

        let mut follow_ups = Vec::new();
        for (name, config) in fields {
            let Some(follow_up) = &config.follow_up else {
                continue;
            };
            let url_field = follow_up.url_field.as_deref().unwrap_or(name);
            match item.get(url_field).and_then(FieldValue::first) {
                Some(url) if !url.trim().is_empty() => follow_ups.push(PendingFollowUp {
                    url: url.trim().to_string(),
                    config: follow_up,
                }),
                _ => debug!("Follow-up for '{}' skipped: '{}' has no URL", name, url_field),
            }
        }
        follow_ups
    }

    pub fn extract<'c>(
        &self,
        container: ElementRef,
        fields: &'c BTreeMap<String, FieldConfig>,
    ) -> Extracted<'c> {
        let mut item = ExtractedItem::new();
        let follow_ups = self.extract_into(container, fields, &mut item);
        Extracted { item, follow_ups }
    }

    fn extract_field(
        &self,
        container: ElementRef,
        name: &str,
        config: &FieldConfig,
        siblings: &BTreeMap<String, FieldConfig>,
        item: &mut ExtractedItem,
    ) {
        let value = match (&config.transform, read_value(container, name, config)) {
            (Some(transform), Some(raw)) => {
                let args = TransformArgs::resolve(config.transform_params.as_ref(), item, |n| {
                    siblings.contains_key(n)
                });
                self.transforms.apply(transform, raw, &args, self.ctx)
            }
            (_, raw) => raw,
        };

        match value {
            Some(v) if !v.is_empty() => {
                item.insert(name.to_string(), v);
            }
            _ => match &config.fallback {
                Some(fallback) => {
                    debug!("Field '{}' is empty; using fallback '{}'", name, fallback);
                    item.insert(name.to_string(), FieldValue::Single(fallback.clone()));
                }
                None if config.required => {
                    warn!("Required field '{}' has no value", name);
                }
                None => {}
            },
        }
    }
}

/// Raw values of one field before any transform.
fn read_value(container: ElementRef, name: &str, config: &FieldConfig) -> Option<FieldValue> {
    let nodes: Vec<ElementRef> = match &config.selector {
        None => vec![container],
        Some(selector) => match Selector::parse(selector) {
            Ok(parsed) => {
                let matches = container.select(&parsed);
                if config.multiple {
                    matches.collect()
                } else {
                    matches.take(1).collect()
                }
            }
            Err(e) => {
                warn!("Field '{}' has an invalid selector '{}': {:?}", name, selector, e);
                return None;
            }
        },
    };

    let values: Vec<String> = nodes
        .iter()
        .filter_map(|node| read_attribute(node, &config.attribute))
        .filter(|v| !v.is_empty())
        .collect();

    if config.multiple {
        (!values.is_empty()).then_some(FieldValue::Many(values))
    } else {
        values.into_iter().next().map(FieldValue::Single)
    }
}

pub fn read_attribute(node: &ElementRef, attribute: &Attribute) -> Option<String> {
    let value = match attribute {
        Attribute::Text => {
            let text = node.text().collect::<String>();
            WHITESPACE.replace_all(text.trim(), " ").into_owned()
        }
        Attribute::InnerHtml => node.inner_html().trim().to_string(),
        Attribute::Href => node.value().attr("href")?.trim().to_string(),
        Attribute::Src => node.value().attr("src")?.trim().to_string(),
        Attribute::Custom(name) => node.value().attr(name)?.trim().to_string(),
    };
    Some(value)
}

/// Field names ordered so that fields whose transform params reference
/// siblings come after those siblings. Cycles fall back to name order.
pub fn field_order(fields: &BTreeMap<String, FieldConfig>) -> Vec<&str> {
    let mut ordered: Vec<&str> = Vec::with_capacity(fields.len());
    let mut placed: BTreeSet<&str> = BTreeSet::new();

    while ordered.len() < fields.len() {
        let ready: Vec<&str> = fields
            .iter()
            .filter(|(name, _)| !placed.contains(name.as_str()))
            .filter(|(name, config)| {
                config
                    .param_references(fields)
                    .all(|dep| dep == name.as_str() || placed.contains(dep))
            })
            .map(|(name, _)| name.as_str())
            .collect();

        let next = if ready.is_empty() {
            // Cycle: take the remaining fields as they come
            fields
                .keys()
                .map(String::as_str)
                .filter(|name| !placed.contains(name))
                .collect()
        } else {
            ready
        };
        for name in next {
            placed.insert(name);
            ordered.push(name);
        }
    }
    ordered
}
