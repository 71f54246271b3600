use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Log file beside the session, since the terminal belongs to the UI.
pub fn default_log_path() -> PathBuf {
    match directories::ProjectDirs::from("", "", "jobtrack") {
        Some(dirs) => dirs.data_dir().join("jobtrack.log"),
        None => PathBuf::from("jobtrack.log"),
    }
}

/// Initializes a `tracing_subscriber` writing to `path`, filtered by
/// `JOBTRACK_LOG` first, then `RUST_LOG`, then `info`.
pub fn init_tracing(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;
    Ok(())
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("JOBTRACK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
