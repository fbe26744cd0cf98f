use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or non-conforming site configuration. Each entry is path-qualified.
    #[error("Configuration is invalid ({} problem(s)): {}", errors.len(), errors.join("; "))]
    ConfigValidation { errors: Vec<String> },

    #[error("Invalid CSS selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    /// A required workflow action failed; the run is aborted.
    #[error("Action #{index} ({action}) failed: {message}")]
    ActionExecution {
        index: usize,
        action: String,
        message: String,
    },

    #[error("Could not parse date '{text}': {reason}")]
    DateParsing { text: String, reason: String },

    #[error("Follow-up extraction for {url} failed: {message}")]
    FollowUp { url: String, message: String },

    /// The final batch failed count or required-field checks.
    #[error("Result validation failed: {0}")]
    ResultValidation(String),
}

impl ScraperError {
    pub fn browser(message: impl Into<String>) -> Self {
        ScraperError::Browser(message.into())
    }

    pub fn selector(selector: &str, message: impl std::fmt::Debug) -> Self {
        ScraperError::Selector {
            selector: selector.to_string(),
            message: format!("{message:?}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
