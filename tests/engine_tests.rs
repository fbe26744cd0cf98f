use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gig_scraper::browser::{Browser, BrowserPage, FixtureSource, SelectorState, StaticBrowser};
use gig_scraper::config::{load_config, parse_config, BrowserOptions, ScrollDirection};
use gig_scraper::domain::GigStatus;
use gig_scraper::{Result, ScraperEngine, ScraperError};

const BASE: &str = "https://www.thefleece.co.uk";

const LISTING: &str = r#"<html><body>
  <div id="cookie-banner"><button class="accept">OK</button></div>
  <div class="event-listing">
    <h3>Idles</h3>
    <span class="event-date">Sat 4th Oct</span>
    <span class="event-times">19:30 - 23:00</span>
    <a href="/events/idles">More info</a>
    <span class="status">SOLD OUT</span>
  </div>
  <div class="event-listing">
    <h3>Gurriers</h3>
    <span class="event-date">Sun 5th Oct</span>
    <span class="event-times">20:00</span>
    <a href="/events/gurriers">More info</a>
  </div>
</body></html>"#;

const IDLES_PAGE: &str = r#"<html><body>
  <div class="event-description"> Bristol's finest return home. </div>
  <div class="event-tags"><a>Punk</a><a>Post-punk</a></div>
</body></html>"#;

fn fleece_config(min_events: usize) -> Value {
    json!({
        "site": { "name": "The Fleece", "source": "the-fleece", "baseUrl": BASE },
        "rateLimit": { "delayBetweenRequests": 0 },
        "workflow": [
            { "type": "navigate", "url": "/whats-on/" },
            { "type": "click", "selector": "#cookie-banner .accept", "optional": true },
            { "type": "wait", "selector": ".event-listing", "timeout": 1000 },
            { "type": "scroll", "direction": "bottom" },
            {
                "type": "extract",
                "containerSelector": ".event-listing",
                "fields": {
                    "title": { "selector": "h3", "required": true },
                    "date": {
                        "selector": ".event-date",
                        "required": true,
                        "transform": "parse-date",
                        "transformParams": { "format": "weekday-day-month", "time": "start" }
                    },
                    "start": { "selector": ".event-times", "transform": "time-range-start" },
                    "link": { "selector": "a", "attribute": "href", "transform": "url" },
                    "status": { "selector": ".status" }
                },
                "followUp": {
                    "urlField": "link",
                    "fields": {
                        "description": { "selector": ".event-description", "transform": "trim" },
                        "genre": { "selector": ".event-tags a", "multiple": true }
                    }
                }
            }
        ],
        "mapping": {
            "title": "title",
            "venue": { "name": "The Fleece", "city": "Bristol", "country": "UK" },
            "dateStart": "date",
            "eventUrl": "link",
            "genre": "genre",
            "description": "description",
            "status": "status"
        },
        "validation": { "minEventsExpected": min_events, "required": ["title", "dateStart", "venue.name"] }
    })
}

fn engine(config: Value) -> ScraperEngine {
    ScraperEngine::new(parse_config(&config.to_string()).unwrap())
        .unwrap()
        .with_today(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap())
}

fn fixtures() -> FixtureSource {
    FixtureSource::new()
        .with_page(format!("{BASE}/whats-on/"), LISTING)
        .with_page(format!("{BASE}/events/idles"), IDLES_PAGE)
}

#[tokio::test]
async fn test_static_run_produces_normalized_gigs() {
    let browser = StaticBrowser::fixtures(fixtures());
    let gigs = engine(fleece_config(1)).run(&browser).await.unwrap();

    assert_eq!(gigs.len(), 2);
    let idles = &gigs[0];
    assert_eq!(idles.title, "Idles");
    assert_eq!(idles.date_start, "2025-10-04T19:30:00.000Z");
    assert_eq!(idles.event_url.as_deref(), Some("https://www.thefleece.co.uk/events/idles"));
    assert_eq!(idles.status, GigStatus::Soldout);
    assert_eq!(idles.description.as_deref(), Some("Bristol's finest return home."));
    assert_eq!(idles.genre, vec!["Punk", "Post-punk"]);
    assert_eq!(idles.venue.city.as_deref(), Some("Bristol"));
    assert_eq!(gigs[1].status, GigStatus::Scheduled);
}

#[tokio::test]
async fn test_follow_up_failure_keeps_base_fields() {
    // No fixture for /events/gurriers, so that follow-up visit fails
    let browser = StaticBrowser::fixtures(fixtures());
    let gigs = engine(fleece_config(1)).run(&browser).await.unwrap();

    let gurriers = gigs.iter().find(|g| g.title == "Gurriers").unwrap();
    assert_eq!(gurriers.date_start, "2025-10-05T20:00:00.000Z");
    assert_eq!(
        gurriers.event_url.as_deref(),
        Some("https://www.thefleece.co.uk/events/gurriers")
    );
    assert!(gurriers.description.is_none());
}

#[tokio::test]
async fn test_shortfall_fails_the_run() {
    let browser = StaticBrowser::fixtures(fixtures());
    let err = engine(fleece_config(5)).run(&browser).await.unwrap_err();

    assert!(matches!(err, ScraperError::ResultValidation(_)), "{err}");
    assert!(err.to_string().contains("2 of 5"), "{err}");
}

#[tokio::test]
async fn test_missing_listing_page_aborts_with_action_error() {
    let browser = StaticBrowser::fixtures(FixtureSource::new());
    let err = engine(fleece_config(1)).run(&browser).await.unwrap_err();

    match err {
        ScraperError::ActionExecution { index, action, .. } => {
            assert_eq!(index, 0);
            assert_eq!(action, "navigate");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_date_groups_from_fixture_directory() {
    let mut config = load_config("configs/the-exchange.json").unwrap();
    config.rate_limit.delay_between_requests = Some(0);
    config.debug.html = false;
    let engine = ScraperEngine::new(config)
        .unwrap()
        .with_today(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
    let browser = StaticBrowser::fixtures(FixtureSource::from_dir("tests/fixtures").unwrap());

    let gigs = engine.run(&browser).await.unwrap();
    let titles: Vec<&str> = gigs.iter().map(|g| g.title.as_str()).collect();
    assert_eq!(titles, vec!["Idles", "Gurriers", "Heartworms"]);

    let idles = &gigs[0];
    // Europe/London is UTC+1 in October before the clocks change
    assert_eq!(idles.date_start, "2025-10-03T19:00:00.000Z");
    assert_eq!(idles.date_end.as_deref(), Some("2025-10-04T01:00:00.000Z"));
    assert_eq!(idles.venue.name, "Main Room");
    assert_eq!(
        idles.event_url.as_deref(),
        Some("https://exchangebristol.com/whats-on/#idles-20251003")
    );
    assert_eq!(gigs[1].venue.name, "Exchange");
    assert_eq!(gigs[2].date_start, "2025-10-04T18:30:00.000Z");
    assert!(gigs[2].date_end.is_none());
}

/// Wraps static pages and records every call the engine makes.
struct RecordingBrowser {
    inner: StaticBrowser,
    log: Arc<Mutex<Vec<String>>>,
}

struct RecordingPage {
    inner: Box<dyn BrowserPage>,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Browser for RecordingBrowser {
    async fn new_page(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserPage>> {
        self.log.lock().unwrap().push("new_page".into());
        Ok(Box::new(RecordingPage {
            inner: self.inner.new_page(options).await?,
            log: self.log.clone(),
        }))
    }
}

#[async_trait]
impl BrowserPage for RecordingPage {
    async fn goto(&mut self, url: &str, wait_for_load: bool) -> Result<()> {
        self.log.lock().unwrap().push(format!("goto {url}"));
        self.inner.goto(url, wait_for_load).await
    }
    async fn selector_state(&mut self, selector: &str) -> Result<SelectorState> {
        self.log.lock().unwrap().push(format!("state {selector}"));
        self.inner.selector_state(selector).await
    }
    async fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<()> {
        self.inner.wait_for_network_idle(timeout).await
    }
    async fn click(&mut self, selector: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("click {selector}"));
        self.inner.click(selector).await
    }
    async fn scroll(&mut self, direction: ScrollDirection, amount: i64) -> Result<()> {
        self.log.lock().unwrap().push(format!("scroll {direction:?}"));
        self.inner.scroll(direction, amount).await
    }
    async fn content(&mut self) -> Result<String> {
        self.log.lock().unwrap().push("content".into());
        self.inner.content().await
    }
    async fn screenshot(&mut self) -> Result<Option<Vec<u8>>> {
        self.inner.screenshot().await
    }
    fn current_url(&self) -> Option<&str> {
        self.inner.current_url()
    }
}

#[tokio::test]
async fn test_actions_run_in_declared_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let browser = RecordingBrowser {
        inner: StaticBrowser::fixtures(fixtures()),
        log: log.clone(),
    };
    engine(fleece_config(1)).run(&browser).await.unwrap();

    let log = log.lock().unwrap().clone();
    let expected = [
        "new_page",
        "goto https://www.thefleece.co.uk/whats-on/",
        "click #cookie-banner .accept",
        "state .event-listing",
        "scroll Bottom",
        "content",
        // follow-ups get their own page, opened on first use
        "new_page",
        "goto https://www.thefleece.co.uk/events/idles",
    ];
    assert_eq!(&log[..expected.len()], &expected);
}
