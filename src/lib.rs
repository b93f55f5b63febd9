//! # NeatData - Tabular Data Cleaning Core
//!
//! NeatData applies an ordered list of named cleaning transforms to an in-memory
//! table and tracks asynchronous cleaning jobs, streaming their progress to any
//! number of observers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use neatdata::pipeline::PipelineEngine;
//! use neatdata::transforms::TransformRegistry;
//! use polars::prelude::*;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # fn example(df: DataFrame) -> anyhow::Result<()> {
//! let registry = Arc::new(TransformRegistry::builtins_only());
//! let engine = PipelineEngine::new(registry);
//!
//! let selection = vec!["trim_spaces".to_owned(), "drop_duplicates".to_owned()];
//! let steps = engine.build_ordered(&selection, &HashMap::new());
//! let outcome = PipelineEngine::run(&steps, &df)?;
//! println!("{}", outcome.report.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`transforms`]: Transform contract, built-in transforms, extension manifests and the registry
//! - [`pipeline`]: Ordered, fail-fast pipeline building and execution
//! - [`jobs`]: Job lifecycle tracking, the in-memory FIFO queue and an optional worker
//! - [`progress`]: Progress events and the subscription broadcaster
//! - [`service`]: Explicit context wiring the above together
//! - [`config`], [`logging`], [`error`], [`io`]: Ambient plumbing
//!
//! ## Key Concepts
//!
//! ### Immutable inputs
//!
//! Transforms receive `&DataFrame` and return a new frame. The caller's table is
//! never modified, so a failed pipeline leaves the original input intact.
//!
//! ### Explicit services
//!
//! There are no global singletons. The registry, queue and broadcaster are owned
//! values shared through `Arc` handles, normally via [`service::CleaningService`].

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod io;
pub mod jobs;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod service;
pub mod transforms;
