//! # NeatData command line entry point
//!
//! ```text
//! main()
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Load settings and initialise logging
//!   └─> Build a Tokio runtime and run the command
//! ```
//!
//! ```bash
//! neatdata transforms --json
//! neatdata clean -i data.csv -m standardize_headers,trim_spaces
//! neatdata run request.json
//! neatdata batch a.csv b.csv --output-dir cleaned/
//! ```

#![warn(clippy::all, rust_2018_idioms)]

mod cli;

use anyhow::{Context as _, Result};
use clap::Parser as _;
use neatdata::config::AppSettings;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let settings = AppSettings::load();

    neatdata::logging::init_with(settings.log_to_file && !cli.no_log_file)?;
    tracing::debug!(?settings, "Loaded settings");

    tokio::runtime::Runtime::new()
        .context("Failed to start Tokio runtime")?
        .block_on(cli::run_command(cli, settings))
}
