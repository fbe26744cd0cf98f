//! The engine's view of a browser: open a page, drive it, read its HTML.
//!
//! [`webdriver::WebDriverBrowser`] renders pages in a real browser through a
//! WebDriver endpoint. [`static_page::StaticBrowser`] serves plain HTML fetched
//! over HTTP or replayed from saved fixtures, which is enough for sites that
//! render their listings server-side.

pub mod debug;
pub mod static_page;
pub mod webdriver;

use async_trait::async_trait;
use std::time::Duration;

use crate::common::error::Result;
use crate::config::{BrowserOptions, ScrollDirection};

pub use debug::DebugCapture;
pub use static_page::{FixtureSource, HttpSource, PageSource, StaticBrowser};
pub use webdriver::WebDriverBrowser;

/// What a CSS selector currently matches on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Absent,
    Hidden,
    Visible,
}

impl SelectorState {
    pub fn is_present(&self) -> bool {
        !matches!(self, SelectorState::Absent)
    }
}

#[async_trait]
pub trait BrowserPage: Send {
    /// Load `url`. With `wait_for_load`, return only once the document is ready.
    async fn goto(&mut self, url: &str, wait_for_load: bool) -> Result<()>;

    async fn selector_state(&mut self, selector: &str) -> Result<SelectorState>;

    /// Block until no new network activity is seen, or `timeout` elapses.
    async fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<()>;

    /// Click the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<()>;

    async fn scroll(&mut self, direction: ScrollDirection, amount: i64) -> Result<()>;

    /// Serialized HTML of the current document.
    async fn content(&mut self) -> Result<String>;

    /// PNG bytes, or `None` when the page cannot render screenshots.
    async fn screenshot(&mut self) -> Result<Option<Vec<u8>>>;

    fn current_url(&self) -> Option<&str>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserPage>>;
}
