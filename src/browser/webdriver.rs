use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::prelude::*;
use tokio::time::{sleep, Instant};
use tracing::{debug, error};

use super::{Browser, BrowserPage, SelectorState};
use crate::common::constants::{NETWORK_IDLE_QUIET_MS, WAIT_POLL_INTERVAL_MS};
use crate::common::error::{Result, ScraperError};
use crate::config::{BrowserOptions, ScrollDirection};

impl From<WebDriverError> for ScraperError {
    fn from(e: WebDriverError) -> Self {
        ScraperError::Browser(e.to_string())
    }
}

/// Opens one WebDriver session per page against a chromedriver/Selenium endpoint.
pub struct WebDriverBrowser {
    server_url: String,
}

impl WebDriverBrowser {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn new_page(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserPage>> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_chrome_arg(&format!(
            "--window-size={},{}",
            options.viewport.width, options.viewport.height
        ))?;
        if let Some(user_agent) = &options.user_agent {
            caps.add_chrome_arg(&format!("--user-agent={user_agent}"))?;
        }
        if options.headless {
            caps.set_headless()?;
        }
        caps.add_chrome_arg("--disable-dev-shm-usage")?;

        let driver = WebDriver::new(&self.server_url, caps).await.map_err(|e| {
            ScraperError::browser(format!(
                "Failed to connect to WebDriver at {}: {}",
                self.server_url, e
            ))
        })?;
        driver
            .set_page_load_timeout(Duration::from_millis(options.timeout))
            .await?;

        debug!("WebDriver session opened at {}", self.server_url);
        Ok(Box::new(WebDriverPage {
            driver: Some(driver),
            url: None,
            timeout: Duration::from_millis(options.timeout),
        }))
    }
}

pub struct WebDriverPage {
    driver: Option<WebDriver>,
    url: Option<String>,
    timeout: Duration,
}

impl WebDriverPage {
    fn driver(&self) -> Result<&WebDriver> {
        self.driver
            .as_ref()
            .ok_or_else(|| ScraperError::browser("WebDriver session already closed"))
    }

    async fn script_u64(&self, script: &str) -> Result<u64> {
        let ret = self.driver()?.execute(script, Vec::new()).await?;
        Ok(ret.json().as_u64().unwrap_or(0))
    }
}

#[async_trait]
impl BrowserPage for WebDriverPage {
    async fn goto(&mut self, url: &str, wait_for_load: bool) -> Result<()> {
        self.driver()?.goto(url).await?;
        self.url = Some(url.to_string());

        if wait_for_load {
            let deadline = Instant::now() + self.timeout;
            loop {
                let ret = self
                    .driver()?
                    .execute("return document.readyState;", Vec::new())
                    .await?;
                if ret.json().as_str() == Some("complete") {
                    break;
                }
                if Instant::now() >= deadline {
                    return Err(ScraperError::browser(format!(
                        "{url} did not finish loading within {:?}",
                        self.timeout
                    )));
                }
                sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
            }
        }
        Ok(())
    }

    async fn selector_state(&mut self, selector: &str) -> Result<SelectorState> {
        let elements = self.driver()?.find_all(By::Css(selector)).await?;
        if elements.is_empty() {
            return Ok(SelectorState::Absent);
        }
        for element in elements {
            if element.is_displayed().await.unwrap_or(false) {
                return Ok(SelectorState::Visible);
            }
        }
        Ok(SelectorState::Hidden)
    }

    /// Idle once the resource timing buffer stops growing for a quiet period.
    async fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<()> {
        const COUNT_RESOURCES: &str = "return performance.getEntriesByType('resource').length;";
        let deadline = Instant::now() + timeout;
        let quiet = Duration::from_millis(NETWORK_IDLE_QUIET_MS);

        let mut last_count = self.script_u64(COUNT_RESOURCES).await?;
        let mut last_change = Instant::now();
        while Instant::now() < deadline {
            sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
            let count = self.script_u64(COUNT_RESOURCES).await?;
            if count != last_count {
                last_count = count;
                last_change = Instant::now();
            } else if last_change.elapsed() >= quiet {
                return Ok(());
            }
        }
        Err(ScraperError::browser(format!(
            "Network did not go idle within {timeout:?}"
        )))
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let element = self.driver()?.find(By::Css(selector)).await?;
        element.click().await?;
        Ok(())
    }

    async fn scroll(&mut self, direction: ScrollDirection, amount: i64) -> Result<()> {
        let script = match direction {
            ScrollDirection::Down => format!("window.scrollBy(0, {amount});"),
            ScrollDirection::Up => format!("window.scrollBy(0, -{amount});"),
            ScrollDirection::Bottom => {
                "window.scrollTo(0, document.body.scrollHeight);".to_string()
            }
        };
        self.driver()?.execute(&script, Vec::new()).await?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        Ok(self.driver()?.source().await?)
    }

    async fn screenshot(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(Some(self.driver()?.screenshot_as_png().await?))
    }

    fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(driver) = self.driver.take() {
            driver.quit().await?;
            debug!("WebDriver session closed");
        }
        Ok(())
    }
}

impl Drop for WebDriverPage {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = driver.quit().await {
                        error!("Error closing WebDriver session during drop: {}", e);
                    }
                });
            }
        }
    }
}
