//! Defaults shared by the config loader, the scaffolder and the executor.

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1366;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 768;
pub const DEFAULT_DELAY_BETWEEN_REQUESTS_MS: u64 = 1_000;
pub const DEFAULT_MAX_CONCURRENCY: u32 = 1;
pub const DEFAULT_MIN_EVENTS_EXPECTED: usize = 1;
pub const DEFAULT_SCROLL_AMOUNT_PX: i64 = 800;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36 gig_scraper/0.1";

/// Polling interval used while waiting for a selector condition
pub const WAIT_POLL_INTERVAL_MS: u64 = 100;

/// Network idle means no new resource entries for this long
pub const NETWORK_IDLE_QUIET_MS: u64 = 500;

/// Inferred years further out than this are assumed to be misparses
pub const MAX_INFERRED_FUTURE_DAYS: i64 = 548;

/// Listing path used when a site links events by bare `#fragment`
pub const DEFAULT_FRAGMENT_PATH: &str = "/whats-on/";

// Item keys written by the date-group walker
pub const DATE_GROUP_KEY: &str = "dateGroup";
pub const DATE_GROUP_DATE_KEY: &str = "dateGroupDate";

pub const DEFAULT_CONFIG_DIR: &str = "configs";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
pub const SETTINGS_FILE: &str = "gig_scraper.toml";
