//! One scrape of one site: workflow, normalization, validation.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use metrics::{counter, histogram};
use tracing::{info, instrument, warn};

use crate::browser::{Browser, DebugCapture};
use crate::common::error::{Result, ScraperError};
use crate::config::{load_config, ScraperConfig};
use crate::datetime::{DateContext, DateFormat, DateFormatRegistry};
use crate::domain::Gig;
use crate::normalize::GigNormalizer;
use crate::transform::{Transform, TransformRegistry};
use crate::validate::ResultValidator;
use crate::workflow::WorkflowExecutor;

/// Owns a validated site config and the registries a run needs.
pub struct ScraperEngine {
    config: ScraperConfig,
    transforms: TransformRegistry,
    formats: DateFormatRegistry,
    timezone: Option<Tz>,
    today: Option<NaiveDate>,
    debug_dir: Option<PathBuf>,
}

impl ScraperEngine {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let formats = DateFormatRegistry::from_aliases(&config.date_formats)?;
        let timezone = config
            .site
            .timezone
            .as_deref()
            .map(|tz| {
                Tz::from_str(tz)
                    .map_err(|e| ScraperError::Config(format!("Unknown timezone '{tz}': {e}")))
            })
            .transpose()?;

        Ok(Self {
            config,
            transforms: TransformRegistry::new(),
            formats,
            timezone,
            today: None,
            debug_dir: None,
        })
    }

    /// Load and validate a config file, then build an engine for it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(load_config(path)?)
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Pin "today" for relative dates and year inference.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    pub fn register_transform(&mut self, name: impl Into<String>, transform: Arc<dyn Transform>) {
        self.transforms.register(name, transform);
    }

    pub fn register_date_format(&mut self, name: impl Into<String>, format: Arc<dyn DateFormat>) {
        self.formats.register(name, format);
    }

    fn date_context(&self) -> DateContext {
        let today = self.today.unwrap_or_else(|| match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).date_naive(),
            None => Utc::now().date_naive(),
        });
        DateContext::new(today).with_timezone(self.timezone)
    }

    /// Run the workflow on a fresh page and return the validated batch.
    #[instrument(skip_all, fields(source = %self.config.site.source))]
    pub async fn run(&self, browser: &dyn Browser) -> Result<Vec<Gig>> {
        let source = self.config.site.source.clone();
        info!("Starting scrape of {}", self.config.site.name);
        counter!("gig_scraper_runs_total", "source" => source.clone()).increment(1);
        let started = Instant::now();

        let dates = self.date_context();
        let debug = DebugCapture::new(&source, &self.config.debug, self.debug_dir.as_deref());
        let executor = WorkflowExecutor::new(
            &self.config,
            browser,
            &self.transforms,
            &self.formats,
            dates,
            debug,
        );

        let mut page = browser.new_page(&self.config.browser).await?;
        let outcome = executor.run(page.as_mut()).await;
        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }
        let run = match outcome {
            Ok(run) => run,
            Err(e) => {
                counter!("gig_scraper_run_failures_total", "source" => source.clone()).increment(1);
                return Err(e);
            }
        };
        histogram!("gig_scraper_raw_items_per_run", "source" => source.clone())
            .record(run.items.len() as f64);

        let normalizer =
            GigNormalizer::new(&self.config, &self.transforms, &self.formats, dates, Utc::now());
        let gigs = normalizer.normalize_all(&run.items);

        if let Err(e) = ResultValidator::new(&self.config.validation).validate(&gigs) {
            counter!("gig_scraper_run_failures_total", "source" => source.clone()).increment(1);
            return Err(e);
        }

        let secs = started.elapsed().as_secs_f64();
        histogram!("gig_scraper_run_duration_seconds", "source" => source).record(secs);
        info!(
            "Scrape finished: {} gig(s) from {} item(s) in {:.1}s",
            gigs.len(),
            run.items.len(),
            secs
        );
        Ok(gigs)
    }
}
