use metrics::counter;
use scraper::Html;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::fields::{FieldExtractor, PendingFollowUp};
use super::{item_label, ExtractedItem};
use crate::browser::BrowserPage;
use crate::common::error::{Result, ScraperError};
use crate::config::FollowUpConfig;

/// Visit `url` and extract `config.fields` from the whole document.
pub async fn fetch_follow_up(
    page: &mut dyn BrowserPage,
    url: &str,
    config: &FollowUpConfig,
    extractor: &FieldExtractor<'_>,
) -> Result<ExtractedItem> {
    let failed = |e: ScraperError| ScraperError::FollowUp {
        url: url.to_string(),
        message: e.to_string(),
    };
    page.goto(url, true).await.map_err(failed)?;
    let html = page.content().await.map_err(failed)?;
    Ok(extract_document(&html, config, extractor))
}

fn extract_document(
    html: &str,
    config: &FollowUpConfig,
    extractor: &FieldExtractor<'_>,
) -> ExtractedItem {
    let document = Html::parse_document(html);
    extractor.extract(document.root_element(), &config.fields).item
}

/// Run an item's follow-ups in order, merging results over existing keys.
///
/// A failed visit is logged and the item keeps the fields it already had.
pub async fn apply_follow_ups(
    page: &mut dyn BrowserPage,
    pending: &[PendingFollowUp<'_>],
    item: &mut ExtractedItem,
    extractor: &FieldExtractor<'_>,
    delay: Option<Duration>,
) {
    for follow_up in pending {
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        match fetch_follow_up(page, &follow_up.url, follow_up.config, extractor).await {
            Ok(partial) => {
                debug!(
                    "Follow-up {} added {} field(s) to '{}'",
                    follow_up.url,
                    partial.len(),
                    item_label(item)
                );
                item.extend(partial);
            }
            Err(e) => {
                warn!(
                    "{}; keeping the {} field(s) already extracted for '{}'",
                    e,
                    item.len(),
                    item_label(item)
                );
                counter!("gig_scraper_follow_up_failures_total").increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{Browser, FixtureSource, StaticBrowser};
    use crate::config::BrowserOptions;
    use crate::datetime::{DateContext, DateFormatRegistry};
    use crate::extract::FieldValue;
    use crate::transform::{TransformContext, TransformRegistry};
    use chrono::NaiveDate;
    use serde_json::json;

    fn follow_up_config() -> FollowUpConfig {
        serde_json::from_value(json!({
            "urlField": "link",
            "fields": {
                "description": { "selector": ".copy" },
                "title": { "selector": "h1" }
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_results_are_merged_and_overwrite() {
        let browser = StaticBrowser::fixtures(FixtureSource::new().with_page(
            "https://x.com/e/1",
            "<html><body><h1>Idles (Full Title)</h1><div class='copy'>Loud.</div></body></html>",
        ));
        let mut page = browser.new_page(&BrowserOptions::default()).await.unwrap();

        let dates = DateContext::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        let formats = DateFormatRegistry::new();
        let ctx = TransformContext { base_url: "https://x.com", dates: &dates, formats: &formats };
        let transforms = TransformRegistry::new();
        let extractor = FieldExtractor::new(&transforms, &ctx);

        let config = follow_up_config();
        let pending = vec![PendingFollowUp { url: "https://x.com/e/1".into(), config: &config }];
        let mut item = ExtractedItem::new();
        item.insert("title".into(), FieldValue::from("Idles"));

        apply_follow_ups(page.as_mut(), &pending, &mut item, &extractor, None).await;
        assert_eq!(item["title"], FieldValue::from("Idles (Full Title)"));
        assert_eq!(item["description"], FieldValue::from("Loud."));
    }

    #[tokio::test]
    async fn test_failed_visit_keeps_existing_fields() {
        let browser = StaticBrowser::fixtures(FixtureSource::new());
        let mut page = browser.new_page(&BrowserOptions::default()).await.unwrap();

        let dates = DateContext::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        let formats = DateFormatRegistry::new();
        let ctx = TransformContext { base_url: "https://x.com", dates: &dates, formats: &formats };
        let transforms = TransformRegistry::new();
        let extractor = FieldExtractor::new(&transforms, &ctx);

        let config = follow_up_config();
        let pending = vec![PendingFollowUp { url: "https://x.com/gone".into(), config: &config }];
        let mut item = ExtractedItem::new();
        item.insert("title".into(), FieldValue::from("Idles"));
        item.insert("link".into(), FieldValue::from("https://x.com/gone"));
        let before = item.clone();

        apply_follow_ups(page.as_mut(), &pending, &mut item, &extractor, None).await;
        assert_eq!(item, before);
    }
}
