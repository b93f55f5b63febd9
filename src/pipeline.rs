//! Ordered, fail-fast execution of transforms over a table.
//!
//! A pipeline is a list of [`PipelineStep`]s, each holding a resolved transform and
//! its merged parameters. Steps run strictly one after another; the output of
//! step N is the input of step N+1.
//!
//! # Selecting steps
//!
//! - [`PipelineEngine::build`]: separate built-in and extension key lists. A
//!   missing built-in list means "all built-ins", an empty one means "none".
//! - [`PipelineEngine::build_ordered`]: keys or display names, kept in the given order.
//! - [`PipelineEngine::adhoc_step`]: wrap any [`Transform`](crate::transforms::Transform).
//!
//! Unknown identifiers are skipped with a warning.
//!
//! # Failure
//!
//! The first failing step ends the run with a [`PipelineError`] naming that step.
//! Nothing produced by earlier steps is returned and the input frame is untouched.
//!
//! ```no_run
//! use neatdata::pipeline::PipelineEngine;
//! use neatdata::transforms::TransformRegistry;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! # fn example(df: polars::prelude::DataFrame) {
//! let engine = PipelineEngine::new(Arc::new(TransformRegistry::builtins_only()));
//! let steps = engine.build(None, None, &Default::default());
//! let token = CancellationToken::new();
//!
//! match PipelineEngine::run_with(&steps, &df, &token, &mut |event| println!("{event:?}")) {
//!     Ok(outcome) => println!("{}", outcome.report.summary()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod request;
pub mod step;

pub use engine::{PipelineEngine, RunOutcome, RunReport, StepEvent};
pub use error::{PipelineError, PipelineStage};
pub use request::PipelineRequest;
pub use step::{PipelineStep, StepOrigin};
