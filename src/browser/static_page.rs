use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Browser, BrowserPage, SelectorState};
use crate::common::constants::DEFAULT_USER_AGENT;
use crate::common::error::{Result, ScraperError};
use crate::config::{BrowserOptions, ScrollDirection};

/// Where a static page's HTML comes from.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTP GET with the configured user agent and timeout.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(options: &BrowserOptions) -> Result<Self> {
        let user_agent = options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_millis(options.timeout))
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Saved HTML keyed by URL, for offline replays and tests.
///
/// Directory fixtures are keyed by file stem; a URL matches the stem built by
/// [`fixture_key`] (`https://x.com/whats-on/` -> `x_com_whats_on.html`).
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    pages: HashMap<String, String>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut pages = HashMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                pages.insert(stem.to_string(), fs::read_to_string(&path)?);
            }
        }
        info!("Loaded {} fixture page(s) from {}", pages.len(), dir.display());
        Ok(Self { pages })
    }

    fn lookup(&self, url: &str) -> Option<&String> {
        let trimmed = url.trim_end_matches('/');
        [
            url.to_string(),
            trimmed.to_string(),
            format!("{trimmed}/"),
            fixture_key(url),
        ]
        .iter()
        .find_map(|key| self.pages.get(key))
    }
}

#[async_trait]
impl PageSource for FixtureSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.lookup(url)
            .cloned()
            .ok_or_else(|| ScraperError::browser(format!("No fixture page for {url}")))
    }
}

/// File stem a URL is stored under in a fixture directory.
pub fn fixture_key(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Pages whose document is whatever the source returned, without script execution.
pub struct StaticBrowser {
    source: Arc<dyn PageSource>,
}

impl StaticBrowser {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self { source }
    }

    pub fn http(options: &BrowserOptions) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpSource::new(options)?)))
    }

    pub fn fixtures(fixtures: FixtureSource) -> Self {
        Self::new(Arc::new(fixtures))
    }
}

#[async_trait]
impl Browser for StaticBrowser {
    async fn new_page(&self, _options: &BrowserOptions) -> Result<Box<dyn BrowserPage>> {
        Ok(Box::new(StaticPage {
            source: self.source.clone(),
            url: None,
            html: None,
        }))
    }
}

pub struct StaticPage {
    source: Arc<dyn PageSource>,
    url: Option<String>,
    html: Option<String>,
}

impl StaticPage {
    fn document(&self) -> Result<&str> {
        self.html
            .as_deref()
            .ok_or_else(|| ScraperError::browser("No document loaded; navigate first"))
    }
}

#[async_trait]
impl BrowserPage for StaticPage {
    async fn goto(&mut self, url: &str, _wait_for_load: bool) -> Result<()> {
        let html = self.source.fetch(url).await?;
        self.url = Some(url.to_string());
        self.html = Some(html);
        Ok(())
    }

    async fn selector_state(&mut self, selector: &str) -> Result<SelectorState> {
        selector_state_in(self.document()?, selector)
    }

    async fn wait_for_network_idle(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        match selector_state_in(self.document()?, selector)? {
            SelectorState::Absent => Err(ScraperError::browser(format!(
                "No element matches '{selector}'"
            ))),
            _ => {
                debug!("Static page: click on '{}' has no effect", selector);
                Ok(())
            }
        }
    }

    async fn scroll(&mut self, _direction: ScrollDirection, _amount: i64) -> Result<()> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.document().map(str::to_string)
    }

    async fn screenshot(&mut self) -> Result<Option<Vec<u8>>> {
        warn!("Static pages cannot take screenshots");
        Ok(None)
    }

    fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

fn selector_state_in(html: &str, selector: &str) -> Result<SelectorState> {
    let parsed = Selector::parse(selector).map_err(|e| ScraperError::selector(selector, e))?;
    let document = Html::parse_document(html);

    let mut state = SelectorState::Absent;
    for element in document.select(&parsed) {
        if is_hidden(&element) {
            state = SelectorState::Hidden;
        } else {
            return Ok(SelectorState::Visible);
        }
    }
    Ok(state)
}

/// `hidden` attribute or inline `display:none`/`visibility:hidden` on the element or an ancestor.
fn is_hidden(element: &ElementRef) -> bool {
    std::iter::once(**element)
        .chain(element.ancestors())
        .filter_map(|node| node.value().as_element())
        .any(|el| {
            if el.attr("hidden").is_some() || el.attr("type") == Some("hidden") {
                return true;
            }
            el.attr("style").is_some_and(|style| {
                let style: String = style
                    .to_ascii_lowercase()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                style.contains("display:none") || style.contains("visibility:hidden")
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div id="cookie" style="display: none"><button class="accept">OK</button></div>
          <ul class="events"><li class="event">One</li></ul>
          <p hidden class="note">later</p>
        </body></html>"#;

    async fn loaded_page() -> Box<dyn BrowserPage> {
        let browser =
            StaticBrowser::fixtures(FixtureSource::new().with_page("https://x.com/events", PAGE));
        let mut page = browser.new_page(&BrowserOptions::default()).await.unwrap();
        page.goto("https://x.com/events/", true).await.unwrap();
        page
    }

    #[test]
    fn test_fixture_key() {
        assert_eq!(fixture_key("https://www.x.com/whats-on/"), "www_x_com_whats_on");
        assert_eq!(fixture_key("https://x.com/e?id=3"), "x_com_e_id_3");
    }

    #[tokio::test]
    async fn test_selector_states() {
        let mut page = loaded_page().await;
        assert_eq!(page.selector_state(".event").await.unwrap(), SelectorState::Visible);
        assert_eq!(page.selector_state(".accept").await.unwrap(), SelectorState::Hidden);
        assert_eq!(page.selector_state(".note").await.unwrap(), SelectorState::Hidden);
        assert_eq!(page.selector_state(".missing").await.unwrap(), SelectorState::Absent);
    }

    #[tokio::test]
    async fn test_click_requires_a_match() {
        let mut page = loaded_page().await;
        assert!(page.click(".event").await.is_ok());
        assert!(page.click("#nope").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_fixture_is_an_error() {
        let browser = StaticBrowser::fixtures(FixtureSource::new());
        let mut page = browser.new_page(&BrowserOptions::default()).await.unwrap();
        assert!(page.goto("https://x.com/", true).await.is_err());
        assert!(page.content().await.is_err());
    }

    #[tokio::test]
    async fn test_fixture_dir_is_keyed_by_url() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x_com_whats_on.html"), PAGE).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = FixtureSource::from_dir(dir.path()).unwrap();
        let html = source.fetch("https://x.com/whats-on/").await.unwrap();
        assert!(html.contains("class=\"event\""));
    }
}
