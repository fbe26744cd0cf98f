use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::common::error::Result;
use crate::domain::Gig;

/// Write a run's gigs to `{output_dir}/{source}_{timestamp}.json`.
pub fn persist_gigs<P: AsRef<Path>>(gigs: &[Gig], source: &str, output_dir: P) -> Result<PathBuf> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("{source}_{timestamp}.json"));

    let json = serde_json::to_string_pretty(gigs)?;
    fs::write(&path, json)?;
    info!("Saved {} gig(s) to {}", gigs.len(), path.display());
    Ok(path)
}
