//! Mapping raw extracted items onto [`Gig`]s.

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, warn};

use crate::config::{Coordinate, MappingValue, ScraperConfig};
use crate::datetime::{parse_iso, to_iso, DateContext, DateFormatRegistry};
use crate::domain::{content_hash, gig_id, Gig, GigStatus, Venue};
use crate::extract::{item_label, ExtractedItem, FieldValue};
use crate::transform::{TransformArgs, TransformContext, TransformRegistry};

pub struct GigNormalizer<'a> {
    config: &'a ScraperConfig,
    transforms: &'a TransformRegistry,
    formats: &'a DateFormatRegistry,
    dates: DateContext,
    now: DateTime<Utc>,
}

impl<'a> GigNormalizer<'a> {
    pub fn new(
        config: &'a ScraperConfig,
        transforms: &'a TransformRegistry,
        formats: &'a DateFormatRegistry,
        dates: DateContext,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            transforms,
            formats,
            dates,
            now,
        }
    }

    /// Normalize every item, dropping (and logging) those without a usable start date.
    pub fn normalize_all(&self, items: &[ExtractedItem]) -> Vec<Gig> {
        let gigs: Vec<Gig> = items.iter().filter_map(|item| self.normalize(item)).collect();
        let dropped = items.len() - gigs.len();
        if dropped > 0 {
            warn!("Dropped {} of {} item(s) without a valid start date", dropped, items.len());
            counter!("gig_scraper_events_skipped_total", "reason" => "date").increment(dropped as u64);
        }
        counter!("gig_scraper_gigs_normalized_total", "source" => self.config.site.source.clone())
            .increment(gigs.len() as u64);
        gigs
    }

    pub fn normalize(&self, item: &ExtractedItem) -> Option<Gig> {
        let mapping = &self.config.mapping;

        let title = self.text(item, Some(&mapping.title)).unwrap_or_default();

        let Some(date_start) = self.date(item, &mapping.date_start) else {
            warn!(
                "Dropping '{}': no valid start date in '{}' ({:?})",
                item_label(item),
                mapping.date_start.field(),
                item.get(mapping.date_start.field())
            );
            return None;
        };
        let date_end = mapping.date_end.as_ref().and_then(|m| self.date(item, m));

        let venue = self.venue(item);
        let status = self
            .text(item, mapping.status.as_ref())
            .and_then(|text| {
                let status = GigStatus::from_text(&text);
                if status.is_none() {
                    debug!("Unrecognised status '{}'; assuming scheduled", text);
                }
                status
            })
            .unwrap_or_default();

        let mut gig = Gig {
            id: gig_id(&venue.name, &title, &date_start, venue.city.as_deref()),
            source: self.config.site.source.clone(),
            source_id: self.text(item, mapping.source_id.as_ref()),
            title,
            artists: self.list(item, mapping.artists.as_ref()),
            venue,
            date_start,
            date_end,
            timezone: self.config.site.timezone.clone(),
            event_url: self.text(item, mapping.event_url.as_ref()),
            tickets_url: self.text(item, mapping.tickets_url.as_ref()),
            images: self.list(item, mapping.images.as_ref()),
            genre: self.list(item, mapping.genre.as_ref()),
            age_restriction: self.text(item, mapping.age_restriction.as_ref()),
            description: self.text(item, mapping.description.as_ref()),
            status,
            hash: String::new(),
            updated_at: to_iso(&self.now),
        };
        gig.hash = content_hash(&gig);
        Some(gig)
    }

    /// Value of a mapping: the named field, piped through the mapping's transform if any.
    fn resolve(&self, item: &ExtractedItem, mapping: &MappingValue) -> Option<FieldValue> {
        let value = item.get(mapping.field())?.clone();
        match mapping {
            MappingValue::Field(_) => Some(value),
            MappingValue::Transformed(t) => {
                let args =
                    TransformArgs::resolve(t.transform_params.as_ref(), item, |n| item.contains_key(n));
                let ctx = TransformContext {
                    base_url: &self.config.site.base_url,
                    dates: &self.dates,
                    formats: self.formats,
                };
                self.transforms.apply(&t.transform, value, &args, &ctx)
            }
        }
    }

    fn text(&self, item: &ExtractedItem, mapping: Option<&MappingValue>) -> Option<String> {
        let value = self.resolve(item, mapping?)?;
        let text = value.first()?.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    fn list(&self, item: &ExtractedItem, mapping: Option<&MappingValue>) -> Vec<String> {
        mapping
            .and_then(|m| self.resolve(item, m))
            .map(|value| {
                value
                    .to_vec()
                    .into_iter()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// ISO timestamps pass through; anything else goes through the `auto` date parser.
    fn date(&self, item: &ExtractedItem, mapping: &MappingValue) -> Option<String> {
        let text = self.text(item, Some(mapping))?;
        if let Some(dt) = parse_iso(&text) {
            return Some(to_iso(&dt));
        }
        match self.formats.parse(None, &text, None, &self.dates) {
            Ok(parsed) => Some(parsed.to_iso(&self.dates)),
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    /// Venue values name an extracted field when the item has it, otherwise they are literals.
    fn literal_or_field(&self, item: &ExtractedItem, value: &str) -> String {
        item.get(value)
            .and_then(FieldValue::first)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| value.to_string())
    }

    fn coordinate(&self, item: &ExtractedItem, value: Option<&Coordinate>) -> Option<f64> {
        match value? {
            Coordinate::Fixed(v) => Some(*v),
            Coordinate::Field(name) => self.literal_or_field(item, name).trim().parse().ok(),
        }
    }

    fn venue(&self, item: &ExtractedItem) -> Venue {
        let mapping = &self.config.mapping.venue;
        Venue {
            name: self.literal_or_field(item, &mapping.name),
            address: mapping.address.as_deref().map(|v| self.literal_or_field(item, v)),
            city: mapping.city.as_deref().map(|v| self.literal_or_field(item, v)),
            country: mapping.country.as_deref().map(|v| self.literal_or_field(item, v)),
            lat: self.coordinate(item, mapping.lat.as_ref()),
            lng: self.coordinate(item, mapping.lng.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use chrono::{NaiveDate, TimeZone};
    use serde_json::json;

    fn config() -> ScraperConfig {
        parse_config(
            &json!({
                "site": { "name": "The Fleece", "source": "the-fleece", "baseUrl": "https://www.thefleece.co.uk" },
                "workflow": [{ "type": "navigate", "url": "/" }],
                "mapping": {
                    "title": "title",
                    "artists": "support",
                    "venue": { "name": "venueName", "city": "Bristol", "country": "UK", "lat": 51.4523, "lng": "lng" },
                    "dateStart": { "field": "date", "transform": "parse-date", "transformParams": { "time": "time" } },
                    "eventUrl": "link",
                    "status": "badge"
                }
            })
            .to_string(),
        )
        .unwrap()
    }

    fn normalize(config: &ScraperConfig, item: &ExtractedItem) -> Option<Gig> {
        let transforms = TransformRegistry::new();
        let formats = DateFormatRegistry::new();
        let dates = DateContext::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        GigNormalizer::new(config, &transforms, &formats, dates, now).normalize(item)
    }

    fn item(pairs: &[(&str, FieldValue)]) -> ExtractedItem {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_maps_fields_and_literals() {
        let config = config();
        let gig = normalize(
            &config,
            &item(&[
                ("title", "Idles".into()),
                ("support", FieldValue::Many(vec!["Idles".into(), " Gurriers ".into()])),
                ("date", "Sat 4th Oct".into()),
                ("time", "19:30".into()),
                ("link", "https://www.thefleece.co.uk/e/1".into()),
                ("lng", "-2.5891".into()),
                ("badge", "Sold Out".into()),
            ]),
        )
        .unwrap();

        assert_eq!(gig.title, "Idles");
        assert_eq!(gig.artists, vec!["Idles", "Gurriers"]);
        assert_eq!(gig.date_start, "2025-10-04T19:30:00.000Z");
        assert_eq!(gig.venue.name, "venueName");
        assert_eq!(gig.venue.city.as_deref(), Some("Bristol"));
        assert_eq!(gig.venue.lat, Some(51.4523));
        assert_eq!(gig.venue.lng, Some(-2.5891));
        assert_eq!(gig.status, GigStatus::Soldout);
        assert_eq!(gig.source, "the-fleece");
        assert_eq!(gig.updated_at, "2025-03-01T09:00:00.000Z");
        assert_eq!(gig.hash.len(), 64);
    }

    #[test]
    fn test_venue_field_reference_wins_over_literal() {
        let config = config();
        let gig = normalize(
            &config,
            &item(&[
                ("title", "Idles".into()),
                ("date", "2025-10-04".into()),
                ("venueName", "Fleece Main Room".into()),
            ]),
        )
        .unwrap();
        assert_eq!(gig.venue.name, "Fleece Main Room");
        assert_eq!(gig.status, GigStatus::Scheduled);
    }

    #[test]
    fn test_item_without_valid_date_is_dropped() {
        let config = config();
        assert!(normalize(&config, &item(&[("title", "Idles".into())])).is_none());
        assert!(normalize(
            &config,
            &item(&[("title", "Idles".into()), ("date", "Valentines day".into())])
        )
        .is_none());
    }

    #[test]
    fn test_identical_items_produce_identical_id_and_hash() {
        let config = config();
        let raw = item(&[("title", "Idles".into()), ("date", "2025-10-04".into())]);
        let a = normalize(&config, &raw).unwrap();
        let b = normalize(&config, &raw).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.hash, b.hash);
    }
}
