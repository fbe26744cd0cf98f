//! Turning rendered HTML into [`ExtractedItem`]s.
//!
//! Extraction is split in two: [`extract_page`] works on a parsed document
//! synchronously and returns items plus the follow-up visits they requested;
//! [`follow_up::apply_follow_ups`] then drives the browser for those visits.

pub mod date_groups;
pub mod fields;
pub mod follow_up;
pub mod item;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::common::error::{Result, ScraperError};
use crate::config::ExtractAction;
use crate::datetime::{DateContext, DateFormatRegistry};

pub use fields::{Extracted, FieldExtractor, PendingFollowUp};
pub use item::{item_label, ExtractedItem, FieldValue};

/// Extract every container matched by the action from one page's HTML.
pub fn extract_page<'c>(
    html: &str,
    action: &'c ExtractAction,
    extractor: &FieldExtractor<'_>,
    formats: &DateFormatRegistry,
    dates: &DateContext,
) -> Result<Vec<Extracted<'c>>> {
    let container_selector = Selector::parse(&action.container_selector)
        .map_err(|e| ScraperError::selector(&action.container_selector, e))?;
    let document = Html::parse_document(html);

    let mut extracted = Vec::new();
    let mut containers = 0usize;
    for container in document.select(&container_selector) {
        containers += 1;
        match &action.date_groups {
            Some(groups) => extracted.extend(date_groups::walk(
                container, action, groups, extractor, formats, dates,
            )?),
            None => extracted.push(extractor.extract(container, &action.fields)),
        }
    }

    if containers == 0 {
        warn!(
            "No containers matched '{}'; the page structure may have changed",
            action.container_selector
        );
    }

    if let Some(follow_up) = &action.follow_up {
        let url_field = follow_up.url_field.as_deref().unwrap_or("url");
        for entry in &mut extracted {
            match entry.item.get(url_field).and_then(FieldValue::first) {
                Some(url) if !url.trim().is_empty() => entry.follow_ups.push(PendingFollowUp {
                    url: url.trim().to_string(),
                    config: follow_up,
                }),
                _ => debug!(
                    "No '{}' on '{}'; skipping follow-up",
                    url_field,
                    item_label(&entry.item)
                ),
            }
        }
    }

    debug!(
        "Extracted {} item(s) from {} container(s) matching '{}'",
        extracted.len(),
        containers,
        action.container_selector
    );
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{TransformContext, TransformRegistry};
    use chrono::NaiveDate;
    use serde_json::json;

    const PAGE: &str = r#"<html><body>
        <article class="gig"><h2>One</h2><a href="/e/1">more</a></article>
        <article class="gig"><h2>Two</h2></article>
    </body></html>"#;

    #[test]
    fn test_action_follow_up_is_requested_per_item_with_url() {
        let action: ExtractAction = serde_json::from_value(json!({
            "containerSelector": "article.gig",
            "fields": {
                "title": { "selector": "h2" },
                "link": { "selector": "a", "attribute": "href", "transform": "url" }
            },
            "followUp": { "urlField": "link", "fields": { "copy": { "selector": "p" } } }
        }))
        .unwrap();

        let dates = DateContext::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        let formats = DateFormatRegistry::new();
        let ctx = TransformContext { base_url: "https://x.com", dates: &dates, formats: &formats };
        let transforms = TransformRegistry::new();
        let extractor = FieldExtractor::new(&transforms, &ctx);

        let extracted = extract_page(PAGE, &action, &extractor, &formats, &dates).unwrap();
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].follow_ups.len(), 1);
        assert_eq!(extracted[0].follow_ups[0].url, "https://x.com/e/1");
        assert!(extracted[1].follow_ups.is_empty());
    }

    #[test]
    fn test_no_containers_is_empty_not_error() {
        let action: ExtractAction = serde_json::from_value(json!({
            "containerSelector": ".nothing",
            "fields": { "title": { "selector": "h2" } }
        }))
        .unwrap();
        let dates = DateContext::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        let formats = DateFormatRegistry::new();
        let ctx = TransformContext { base_url: "https://x.com", dates: &dates, formats: &formats };
        let transforms = TransformRegistry::new();
        let extractor = FieldExtractor::new(&transforms, &ctx);

        assert!(extract_page(PAGE, &action, &extractor, &formats, &dates).unwrap().is_empty());
    }
}
