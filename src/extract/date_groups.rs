//! Listings where a date heading is followed by the events on that date, all
//! as siblings: `<h3>Friday 3rd October</h3><div class=event/>...<h3>...`.

use chrono::NaiveDate;
use metrics::counter;
use scraper::{ElementRef, Selector};
use tracing::{debug, warn};

use super::fields::{read_attribute, Extracted, FieldExtractor};
use super::{item_label, ExtractedItem, FieldValue};
use crate::common::constants::{DATE_GROUP_DATE_KEY, DATE_GROUP_KEY};
use crate::common::error::{Result, ScraperError};
use crate::config::{Attribute, DateGroupConfig, ExtractAction};
use crate::datetime::{DateContext, DateFormatRegistry};

struct DateGroup {
    text: String,
    date: Option<NaiveDate>,
    skipped: Vec<String>,
}

impl DateGroup {
    fn close(self) {
        if self.skipped.is_empty() {
            return;
        }
        warn!(
            "Skipped {} event(s) under unparseable date group '{}': {:?}",
            self.skipped.len(),
            self.text,
            self.skipped
        );
        counter!("gig_scraper_events_skipped_total", "reason" => "date_group").increment(self.skipped.len() as u64);
    }
}

/// Walk the container's children in order, assigning each event the date of the latest heading.
///
/// Events under a heading that does not parse as a date are dropped, as are
/// events that appear before the first heading.
pub fn walk<'c>(
    container: ElementRef,
    action: &'c ExtractAction,
    groups: &DateGroupConfig,
    extractor: &FieldExtractor<'_>,
    formats: &DateFormatRegistry,
    dates: &DateContext,
) -> Result<Vec<Extracted<'c>>> {
    let heading = Selector::parse(&groups.heading_selector)
        .map_err(|e| ScraperError::selector(&groups.heading_selector, e))?;
    let event = Selector::parse(&groups.event_selector)
        .map_err(|e| ScraperError::selector(&groups.event_selector, e))?;

    let mut results = Vec::new();
    let mut current: Option<DateGroup> = None;
    let mut orphans = 0usize;

    for element in container.children().filter_map(ElementRef::wrap) {
        if heading.matches(&element) {
            if let Some(previous) = current.take() {
                previous.close();
            }
            let text = read_attribute(&element, &Attribute::Text).unwrap_or_default();
            let date = match formats.parse(groups.format.as_deref(), &text, None, dates) {
                Ok(parsed) => Some(parsed.date),
                Err(e) => {
                    debug!("Date group heading is not a date: {}", e);
                    None
                }
            };
            current = Some(DateGroup {
                text,
                date,
                skipped: Vec::new(),
            });
        } else if event.matches(&element) {
            let Some(group) = current.as_mut() else {
                orphans += 1;
                continue;
            };

            let mut item = ExtractedItem::new();
            item.insert(DATE_GROUP_KEY.to_string(), FieldValue::Single(group.text.clone()));
            if let Some(date) = group.date {
                item.insert(
                    DATE_GROUP_DATE_KEY.to_string(),
                    FieldValue::Single(date.format("%Y-%m-%d").to_string()),
                );
            }
            let follow_ups = extractor.extract_into(element, &action.fields, &mut item);

            if group.date.is_some() {
                results.push(Extracted { item, follow_ups });
            } else {
                group.skipped.push(item_label(&item).to_string());
            }
        }
    }
    if let Some(last) = current.take() {
        last.close();
    }

    if orphans > 0 {
        warn!("Skipped {} event(s) that appear before any date heading", orphans);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{TransformContext, TransformRegistry};
    use scraper::Html;
    use serde_json::json;

    const LISTING: &str = r#"
        <div class="listing">
          <div class="event"><h4>Too early</h4></div>
          <h3 class="day">Friday 3rd October</h3>
          <div class="event"><h4>Idles</h4><span class="time">20:00 - 02:00</span></div>
          <div class="event"><h4>Gurriers</h4><span class="time">19:00 - 22:00</span></div>
          <h3 class="day">Valentines day</h3>
          <div class="event"><h4>Love Songs</h4></div>
          <div class="event"><h4>More Love Songs</h4></div>
          <h3 class="day">Sat 4th Oct</h3>
          <p>advert</p>
          <div class="event"><h4>Heartworms</h4></div>
        </div>"#;

    fn action() -> ExtractAction {
        serde_json::from_value(json!({
            "containerSelector": ".listing",
            "dateGroups": { "headingSelector": "h3.day", "eventSelector": ".event" },
            "fields": {
                "title": { "selector": "h4", "required": true },
                "end": {
                    "selector": ".time",
                    "transform": "date-time",
                    "transformParams": { "date": "dateGroupDate", "isEndTime": true }
                }
            }
        }))
        .unwrap()
    }

    fn run(action: &ExtractAction) -> Vec<ExtractedItem> {
        let dates = DateContext::new(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
        let formats = DateFormatRegistry::new();
        let ctx = TransformContext { base_url: "https://x.com", dates: &dates, formats: &formats };
        let transforms = TransformRegistry::new();
        let extractor = FieldExtractor::new(&transforms, &ctx);

        let document = Html::parse_document(LISTING);
        let selector = Selector::parse(&action.container_selector).unwrap();
        let container = document.select(&selector).next().unwrap();
        let groups = action.date_groups.as_ref().unwrap();
        walk(container, action, groups, &extractor, &formats, &dates)
            .unwrap()
            .into_iter()
            .map(|e| e.item)
            .collect()
    }

    #[test]
    fn test_heading_date_applies_to_following_events() {
        let items = run(&action());
        let titles: Vec<_> = items.iter().map(|i| item_label(i).to_string()).collect();
        assert_eq!(titles, vec!["Idles", "Gurriers", "Heartworms"]);
        assert_eq!(items[0][DATE_GROUP_KEY], FieldValue::from("Friday 3rd October"));
        assert_eq!(items[0][DATE_GROUP_DATE_KEY], FieldValue::from("2025-10-03"));
        assert_eq!(items[2][DATE_GROUP_DATE_KEY], FieldValue::from("2025-10-04"));
    }

    #[test]
    fn test_unparseable_group_emits_nothing() {
        let items = run(&action());
        assert!(items.iter().all(|i| !item_label(i).contains("Love")));
    }

    #[test]
    fn test_end_time_crossing_midnight_lands_next_day() {
        let items = run(&action());
        assert_eq!(items[0]["end"], FieldValue::from("2025-10-04T02:00:00.000Z"));
        assert_eq!(items[1]["end"], FieldValue::from("2025-10-03T22:00:00.000Z"));
    }
}
