//! Logging setup for NeatData.
//!
//! Console output goes to stderr so command output on stdout stays machine
//! readable. When file logging is enabled two daily rolling files are written
//! to the data directory:
//!
//! - `neatdata.<date>.log`: everything that passes the filter
//! - `error.<date>.log`: warnings and errors only
//!
//! The filter defaults to `info` and can be overridden with `RUST_LOG`.
//!
//! ```no_run
//! neatdata::logging::init()?;
//! tracing::info!("ready");
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const MAX_LOG_FILES: usize = 10;

/// Platform log directory, e.g. `~/.local/share/neatdata/logs` on Linux. Created if missing.
pub fn get_log_dir() -> Result<PathBuf> {
    let log_dir = dirs::data_dir()
        .context("Failed to determine data directory")?
        .join("neatdata")
        .join("logs");

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    Ok(log_dir)
}

fn rolling(log_dir: &PathBuf, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create {prefix} log appender"))
}

/// Console plus rolling file logs
pub fn init() -> Result<()> {
    init_with(true)
}

/// Install the global subscriber, optionally without file output.
///
/// Fails if a subscriber is already installed.
pub fn init_with(to_file: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    let (file_layers, log_dir) = if to_file {
        let log_dir = get_log_dir()?;
        let all = fmt::layer()
            .with_thread_names(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false)
            .with_writer(rolling(&log_dir, "neatdata")?);
        let errors = fmt::layer()
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false)
            .with_writer(rolling(&log_dir, "error")?)
            .with_filter(EnvFilter::new("warn"));
        (Some(all.and_then(errors)), Some(log_dir))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layers)
        .try_init()
        .context("Logging is already initialised")?;

    if let Some(dir) = log_dir {
        tracing::debug!("Writing logs to {}", dir.display());
    }
    Ok(())
}

/// Today's main log file
pub fn get_current_log_path() -> Result<PathBuf> {
    let today = chrono::Local::now().format("%Y-%m-%d");
    Ok(get_log_dir()?.join(format!("neatdata.{today}.log")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_paths_live_under_neatdata() -> Result<()> {
        let log_dir = get_log_dir()?;
        assert!(log_dir.ends_with("neatdata/logs") || log_dir.ends_with("neatdata\\logs"));
        assert!(get_current_log_path()?.starts_with(&log_dir));
        Ok(())
    }
}
