//! Engine-wide settings: where configs, output and debug artifacts live and
//! which WebDriver endpoint to use. Read from an optional `gig_scraper.toml`,
//! then overridden by `GIG_SCRAPER_*` environment variables (a `.env` file is
//! honoured).

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::constants::{
    DEFAULT_CONFIG_DIR, DEFAULT_OUTPUT_DIR, DEFAULT_WEBDRIVER_URL, SETTINGS_FILE,
};
use crate::common::error::{Result, ScraperError};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub config_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Overrides every site's `debug.outputDir`
    pub debug_dir: Option<PathBuf>,
    pub webdriver_url: String,
    pub log_dir: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            debug_dir: None,
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl EngineSettings {
    /// `gig_scraper.toml` in the working directory (if present) plus environment overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut settings = Self::from_file(SETTINGS_FILE)?;
        settings.apply_env(|key| env::var(key).ok());
        Ok(settings)
    }

    /// Missing files yield the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read settings file '{}': {}", path.display(), e))
        })?;
        let settings: EngineSettings = toml::from_str(&content)?;
        Ok(settings)
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("GIG_SCRAPER_CONFIG_DIR") {
            self.config_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("GIG_SCRAPER_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("GIG_SCRAPER_DEBUG_DIR") {
            self.debug_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup("GIG_SCRAPER_WEBDRIVER_URL") {
            self.webdriver_url = url;
        }
        if let Some(dir) = lookup("GIG_SCRAPER_LOG_DIR") {
            self.log_dir = dir;
        }
    }
}
