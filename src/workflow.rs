//! Runs a site's workflow against one browser page, in declared order.
//!
//! Everything a run accumulates lives in [`RunContext`], which is created per
//! run and handed back to the caller. A failing required action aborts the run
//! with [`ScraperError::ActionExecution`] after debug artifacts are captured.

use metrics::counter;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::browser::{Browser, BrowserPage, DebugCapture, SelectorState};
use crate::common::constants::{DEFAULT_SCROLL_AMOUNT_PX, WAIT_POLL_INTERVAL_MS};
use crate::common::error::{Result, ScraperError};
use crate::config::{
    ActionConfig, ClickAction, ExtractAction, NavigateAction, ScraperConfig, ScrollAction,
    WaitAction, WaitCondition,
};
use crate::datetime::{DateContext, DateFormatRegistry};
use crate::extract::follow_up::apply_follow_ups;
use crate::extract::{extract_page, ExtractedItem, FieldExtractor};
use crate::transform::links::resolve_url;
use crate::transform::{TransformContext, TransformRegistry};

/// Where a run is in its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// The action at this index is next
    Pending(usize),
    Completed,
    /// The action at this index failed
    Failed(usize),
}

/// Mutable state of one run.
pub struct RunContext {
    pub state: RunState,
    pub items: Vec<ExtractedItem>,
    navigated: bool,
    follow_up_page: Option<Box<dyn BrowserPage>>,
    follow_up_page_failed: bool,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            state: RunState::Pending(0),
            items: Vec::new(),
            navigated: false,
            follow_up_page: None,
            follow_up_page_failed: false,
        }
    }

    async fn close(&mut self) {
        if let Some(mut page) = self.follow_up_page.take() {
            if let Err(e) = page.close().await {
                warn!("Failed to close follow-up page: {}", e);
            }
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WorkflowExecutor<'a> {
    config: &'a ScraperConfig,
    browser: &'a dyn Browser,
    transforms: &'a TransformRegistry,
    formats: &'a DateFormatRegistry,
    dates: DateContext,
    debug: DebugCapture,
}

impl<'a> WorkflowExecutor<'a> {
    pub fn new(
        config: &'a ScraperConfig,
        browser: &'a dyn Browser,
        transforms: &'a TransformRegistry,
        formats: &'a DateFormatRegistry,
        dates: DateContext,
        debug: DebugCapture,
    ) -> Self {
        Self {
            config,
            browser,
            transforms,
            formats,
            dates,
            debug,
        }
    }

    fn delay(&self) -> Option<Duration> {
        self.config
            .rate_limit
            .delay_between_requests
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Execute every action in order. Returns the run context on completion.
    #[instrument(skip_all, fields(source = %self.config.site.source))]
    pub async fn run(&self, page: &mut dyn BrowserPage) -> Result<RunContext> {
        let mut ctx = RunContext::new();
        let result = self.run_actions(page, &mut ctx).await;
        ctx.close().await;
        result.map(|()| ctx)
    }

    async fn run_actions(&self, page: &mut dyn BrowserPage, ctx: &mut RunContext) -> Result<()> {
        for (index, action) in self.config.workflow.iter().enumerate() {
            if index > 0 {
                if let Some(delay) = self.delay() {
                    sleep(delay).await;
                }
            }
            ctx.state = RunState::Pending(index);
            debug!("Action #{} ({})", index, action.kind());

            if let Err(e) = self.execute_action(index, action, page, ctx).await {
                ctx.state = RunState::Failed(index);
                counter!("gig_scraper_action_failures_total", "action" => action.kind()).increment(1);
                return Err(e);
            }
        }
        ctx.state = RunState::Completed;
        info!(
            "Workflow completed: {} action(s), {} item(s)",
            self.config.workflow.len(),
            ctx.items.len()
        );
        Ok(())
    }

    async fn execute_action(
        &self,
        index: usize,
        action: &ActionConfig,
        page: &mut dyn BrowserPage,
        ctx: &mut RunContext,
    ) -> Result<()> {
        match action {
            ActionConfig::Navigate(navigate) => self.navigate(index, navigate, page, ctx).await,
            ActionConfig::Wait(wait) => self.wait(index, wait, page).await,
            ActionConfig::Click(click) => self.click(index, click, page).await,
            ActionConfig::Scroll(scroll) => self.scroll(index, scroll, page).await,
            ActionConfig::Extract(extract) => self.extract(index, extract, page, ctx).await,
        }
    }

    async fn fail(
        &self,
        index: usize,
        action: &str,
        selector: Option<&str>,
        page: &mut dyn BrowserPage,
        message: String,
    ) -> ScraperError {
        self.debug.capture(page, "failed", action, selector).await;
        ScraperError::ActionExecution {
            index,
            action: action.to_string(),
            message,
        }
    }

    async fn navigate(
        &self,
        index: usize,
        action: &NavigateAction,
        page: &mut dyn BrowserPage,
        ctx: &mut RunContext,
    ) -> Result<()> {
        let url = resolve_url(&action.url, &self.config.site.base_url, None)
            .unwrap_or_else(|| self.config.site.base_url.clone());
        info!("Navigating to {}", url);

        match page.goto(&url, action.wait_for_load.unwrap_or(true)).await {
            Ok(()) => {
                ctx.navigated = true;
                Ok(())
            }
            Err(e) => Err(self
                .fail(index, "navigate", None, page, format!("could not load {url}: {e}"))
                .await),
        }
    }

    async fn wait(&self, index: usize, action: &WaitAction, page: &mut dyn BrowserPage) -> Result<()> {
        let timeout = Duration::from_millis(action.timeout.unwrap_or(self.config.browser.timeout));

        let Some(selector) = action.selector.as_deref() else {
            return match page.wait_for_network_idle(timeout).await {
                Ok(()) => Ok(()),
                Err(e) => Err(self.fail(index, "wait", None, page, e.to_string()).await),
            };
        };

        if action.condition == WaitCondition::Networkidle {
            if let Err(e) = page.wait_for_network_idle(timeout).await {
                return Err(self.fail(index, "wait", Some(selector), page, e.to_string()).await);
            }
            return Ok(());
        }

        let satisfied = match poll_selector(page, selector, action.condition, timeout).await {
            Ok(satisfied) => satisfied,
            Err(e) => return Err(self.fail(index, "wait", Some(selector), page, e.to_string()).await),
        };
        if satisfied {
            return Ok(());
        }

        if action.condition == WaitCondition::Visible {
            self.recover_visible_wait(index, selector, timeout, page).await
        } else {
            Err(self
                .fail(
                    index,
                    "wait",
                    Some(selector),
                    page,
                    format!("'{selector}' still visible after {timeout:?}"),
                )
                .await)
        }
    }

    /// Sleep half the timeout, then accept the selector if it is present at all.
    async fn recover_visible_wait(
        &self,
        index: usize,
        selector: &str,
        timeout: Duration,
        page: &mut dyn BrowserPage,
    ) -> Result<()> {
        warn!(
            "'{}' not visible after {:?}; attempting fallback recovery",
            selector, timeout
        );
        self.debug.capture(page, "before", "wait", Some(selector)).await;
        sleep(timeout / 2).await;

        match page.selector_state(selector).await {
            Ok(state) if state.is_present() => {
                info!("Recovered: '{}' is present ({:?})", selector, state);
                Ok(())
            }
            Ok(_) => {
                self.debug.capture(page, "after", "wait", Some(selector)).await;
                Err(ScraperError::ActionExecution {
                    index,
                    action: "wait".to_string(),
                    message: format!("'{selector}' did not appear within {timeout:?}"),
                })
            }
            Err(e) => Err(self.fail(index, "wait", Some(selector), page, e.to_string()).await),
        }
    }

    async fn click(&self, index: usize, action: &ClickAction, page: &mut dyn BrowserPage) -> Result<()> {
        match page.click(&action.selector).await {
            Ok(()) => {}
            Err(e) if action.optional => {
                info!("Optional click on '{}' skipped: {}", action.selector, e);
                return Ok(());
            }
            Err(e) => {
                return Err(self
                    .fail(index, "click", Some(&action.selector), page, e.to_string())
                    .await)
            }
        }
        if let Some(ms) = action.wait_after {
            sleep(Duration::from_millis(ms)).await;
        }
        Ok(())
    }

    async fn scroll(&self, index: usize, action: &ScrollAction, page: &mut dyn BrowserPage) -> Result<()> {
        let amount = action.amount.unwrap_or(DEFAULT_SCROLL_AMOUNT_PX);
        if let Err(e) = page.scroll(action.direction, amount).await {
            return Err(self.fail(index, "scroll", None, page, e.to_string()).await);
        }
        if let Some(ms) = action.wait_after {
            sleep(Duration::from_millis(ms)).await;
        }
        Ok(())
    }

    async fn extract(
        &self,
        index: usize,
        action: &ExtractAction,
        page: &mut dyn BrowserPage,
        ctx: &mut RunContext,
    ) -> Result<()> {
        if !ctx.navigated {
            return Err(ScraperError::ActionExecution {
                index,
                action: "extract".to_string(),
                message: "no page has been navigated to yet".to_string(),
            });
        }

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => return Err(self.fail(index, "extract", None, page, e.to_string()).await),
        };

        let transform_ctx = TransformContext {
            base_url: &self.config.site.base_url,
            dates: &self.dates,
            formats: self.formats,
        };
        let extractor = FieldExtractor::new(self.transforms, &transform_ctx);
        let extracted = extract_page(&html, action, &extractor, self.formats, &self.dates)
            .map_err(|e| ScraperError::ActionExecution {
                index,
                action: "extract".to_string(),
                message: e.to_string(),
            })?;

        let count = extracted.len();
        for entry in extracted {
            let mut item = entry.item;
            if !entry.follow_ups.is_empty() {
                if let Some(follow_page) = self.follow_up_page(ctx).await {
                    apply_follow_ups(
                        follow_page,
                        &entry.follow_ups,
                        &mut item,
                        &extractor,
                        self.delay(),
                    )
                    .await;
                }
            }
            ctx.items.push(item);
        }

        counter!("gig_scraper_items_extracted_total", "source" => self.config.site.source.clone())
            .increment(count as u64);
        info!("Extracted {} item(s) with '{}'", count, action.container_selector);
        Ok(())
    }

    /// The shared page used for follow-up visits, opened on first use.
    async fn follow_up_page<'p>(&self, ctx: &'p mut RunContext) -> Option<&'p mut dyn BrowserPage> {
        if ctx.follow_up_page.is_none() && !ctx.follow_up_page_failed {
            match self.browser.new_page(&self.config.browser).await {
                Ok(page) => ctx.follow_up_page = Some(page),
                Err(e) => {
                    warn!("Could not open a page for follow-ups; they will be skipped: {}", e);
                    ctx.follow_up_page_failed = true;
                }
            }
        }
        match ctx.follow_up_page.as_mut() {
            Some(page) => Some(page.as_mut()),
            None => None,
        }
    }
}

/// Poll until the condition holds. `Ok(false)` on timeout.
async fn poll_selector(
    page: &mut dyn BrowserPage,
    selector: &str,
    condition: WaitCondition,
    timeout: Duration,
) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        let state = page.selector_state(selector).await?;
        let satisfied = match condition {
            WaitCondition::Visible => state == SelectorState::Visible,
            WaitCondition::Hidden => state != SelectorState::Visible,
            WaitCondition::Networkidle => true,
        };
        if satisfied {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
    }
}
