use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::BrowserPage;
use crate::config::DebugOptions;

/// Writes screenshots and HTML snapshots for postmortems.
///
/// File names encode the site, the stage, the failing action and selector and
/// a timestamp, e.g. `thekla_before_wait_event-card_20250813_201502_117.html`.
/// Capture problems are logged and never fail the run.
#[derive(Debug, Clone)]
pub struct DebugCapture {
    source: String,
    dir: PathBuf,
    screenshots: bool,
    html: bool,
}

impl DebugCapture {
    /// `dir_override` wins over the site's `debug.outputDir`; the working directory is the default.
    pub fn new(source: &str, options: &DebugOptions, dir_override: Option<&Path>) -> Self {
        let dir = dir_override
            .map(Path::to_path_buf)
            .or_else(|| options.output_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            source: source.to_string(),
            dir,
            screenshots: options.screenshots,
            html: options.html,
        }
    }

    pub fn enabled(&self) -> bool {
        self.screenshots || self.html
    }

    pub fn artifact_stem(&self, stage: &str, action: &str, selector: Option<&str>) -> String {
        let mut parts = vec![self.source.clone(), stage.to_string(), action.to_string()];
        if let Some(selector) = selector {
            let cleaned = sanitize(selector);
            if !cleaned.is_empty() {
                parts.push(cleaned);
            }
        }
        parts.push(Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string());
        parts.join("_")
    }

    /// Capture whatever is enabled. Returns the files written.
    pub async fn capture(
        &self,
        page: &mut dyn BrowserPage,
        stage: &str,
        action: &str,
        selector: Option<&str>,
    ) -> Vec<PathBuf> {
        let mut written = Vec::new();
        if !self.enabled() {
            return written;
        }
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!("Cannot create debug directory {}: {}", self.dir.display(), e);
            return written;
        }
        let stem = self.artifact_stem(stage, action, selector);

        if self.html {
            match page.content().await {
                Ok(html) => self.write(&format!("{stem}.html"), html.as_bytes(), &mut written),
                Err(e) => warn!("Could not read page HTML for debug capture: {}", e),
            }
        }
        if self.screenshots {
            match page.screenshot().await {
                Ok(Some(png)) => self.write(&format!("{stem}.png"), &png, &mut written),
                Ok(None) => {}
                Err(e) => warn!("Could not take debug screenshot: {}", e),
            }
        }
        written
    }

    fn write(&self, name: &str, bytes: &[u8], written: &mut Vec<PathBuf>) {
        let path = self.dir.join(name);
        match fs::write(&path, bytes) {
            Ok(()) => {
                info!("Saved debug artifact {}", path.display());
                written.push(path);
            }
            Err(e) => warn!("Failed to write debug artifact {}: {}", path.display(), e),
        }
    }
}

fn sanitize(selector: &str) -> String {
    selector
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .take(6)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{Browser, FixtureSource, StaticBrowser};
    use crate::config::BrowserOptions;

    fn options(html: bool, screenshots: bool) -> DebugOptions {
        DebugOptions {
            screenshots,
            html,
            output_dir: None,
        }
    }

    #[test]
    fn test_artifact_stem_encodes_action_and_selector() {
        let capture = DebugCapture::new("thekla", &options(true, false), None);
        let stem = capture.artifact_stem("before", "wait", Some(".event-card > h2"));
        assert!(stem.starts_with("thekla_before_wait_event-card-h2_"), "{stem}");
    }

    #[tokio::test]
    async fn test_capture_writes_html_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let capture = DebugCapture::new("x", &options(true, true), Some(dir.path()));
        let browser = StaticBrowser::fixtures(
            FixtureSource::new().with_page("https://x.com/", "<html><body>hi</body></html>"),
        );
        let mut page = browser.new_page(&BrowserOptions::default()).await.unwrap();
        page.goto("https://x.com/", false).await.unwrap();

        let written = capture.capture(page.as_mut(), "after", "wait", Some(".a")).await;
        // Static pages have no screenshots, only the HTML snapshot is written
        assert_eq!(written.len(), 1);
        assert!(fs::read_to_string(&written[0]).unwrap().contains("hi"));
    }

    #[tokio::test]
    async fn test_disabled_capture_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let capture = DebugCapture::new("x", &options(false, false), Some(dir.path()));
        let browser = StaticBrowser::fixtures(FixtureSource::new());
        let mut page = browser.new_page(&BrowserOptions::default()).await.unwrap();
        assert!(capture.capture(page.as_mut(), "before", "click", None).await.is_empty());
    }
}
