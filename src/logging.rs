use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::OracleConfig;
use crate::persist::cache_path;

const LOG_FILE: &str = "kp_oracle.log";

/// Installs the global subscriber. The terminal owns stdout, so output goes to a file.
pub fn init(cfg: &OracleConfig) -> Result<Option<PathBuf>> {
    let Some(path) = cfg
        .log_file
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| cache_path(LOG_FILE))
    else {
        return Ok(None);
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let filter = EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|err| anyhow::anyhow!("install tracing subscriber: {err}"))?;
    Ok(Some(path))
}
