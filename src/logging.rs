use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::common::error::{Result, ScraperError};

/// Console output plus a JSON log file rolled daily under `log_dir`.
///
/// `RUST_LOG` directives are honoured; this crate logs at `info` unless told otherwise.
pub fn init_logging(log_dir: &str) -> Result<()> {
    fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "gig_scraper.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stdout);

    let directive = "gig_scraper=info"
        .parse()
        .map_err(|e| ScraperError::Config(format!("Invalid log directive: {e}")))?;

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(directive))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| ScraperError::Config(format!("Logging already initialised: {e}")))?;

    // The writer flushes on drop; it has to live for the whole process
    std::mem::forget(guard);
    Ok(())
}
