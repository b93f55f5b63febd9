//! Centralized error handling for NeatData.
//!
//! Most plumbing (transform bodies, file I/O) uses `anyhow` with `.context(...)`.
//! Errors that callers are expected to branch on have their own types:
//!
//! - [`crate::pipeline::PipelineError`]: a pipeline step failed or the run was cancelled
//! - [`crate::jobs::JobError`]: a job transition hit an unknown id or a terminal state
//!
//! [`NeatError`] collects everything else behind one enum so the `?` operator
//! works across module boundaries:
//!
//! ```no_run
//! use neatdata::error::{Result, ResultExt as _};
//!
//! fn read_manifest(path: &str) -> Result<String> {
//!     let text = std::fs::read_to_string(path).context("Failed to read manifest")?;
//!     Ok(text)
//! }
//! ```

use crate::jobs::JobError;
use crate::pipeline::PipelineError;
use std::fmt;

/// Main error type for NeatData operations.
#[derive(Debug)]
pub enum NeatError {
    /// I/O errors (file operations, directories)
    Io(std::io::Error),

    /// Data processing errors (Polars, parsing, etc.)
    DataProcessing(String),

    /// Configuration errors
    Config(String),

    /// A transform or extension manifest violates the plugin contract
    InvalidTransform(String),

    /// A pipeline step failed
    Pipeline(PipelineError),

    /// A job transition was rejected
    Job(JobError),

    /// Generic error with context
    Other(String),
}

impl fmt::Display for NeatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::InvalidTransform(msg) => write!(f, "Invalid transform: {msg}"),
            Self::Pipeline(e) => write!(f, "{e}"),
            Self::Job(e) => write!(f, "{e}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for NeatError {}

impl From<std::io::Error> for NeatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for NeatError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for NeatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for NeatError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

impl From<PipelineError> for NeatError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(err)
    }
}

impl From<JobError> for NeatError {
    fn from(err: JobError) -> Self {
        Self::Job(err)
    }
}

impl From<NeatError> for String {
    fn from(err: NeatError) -> Self {
        err.to_string()
    }
}

/// Result type alias for NeatData operations.
pub type Result<T> = std::result::Result<T, NeatError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<NeatError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: NeatError = e.into();
            NeatError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: NeatError = e.into();
            NeatError::Other(format!("{}: {}", f(), err))
        })
    }
}
