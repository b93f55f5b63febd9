//! Job lifecycle tracking for asynchronous and batch cleaning.
//!
//! A [`Job`] moves through a small state machine:
//!
//! ```text
//! Pending ──start──▶ Processing ──complete──▶ Completed
//!    │                   │
//!    ├──────fail─────────┼──────────────────▶ Failed
//!    └──────cancel───────┴──────────────────▶ Cancelled
//! ```
//!
//! Completed, failed and cancelled are terminal. [`JobQueue`] serialises every
//! transition behind one lock and keeps pending jobs in submission order.
//! [`JobWorker`] is an opt-in consumer that runs queued jobs through the pipeline.

pub mod job;
pub mod queue;
pub mod worker;

pub use job::{Job, JobStatus, clamp_percent};
pub use queue::{JobError, JobParams, JobQueue, QueueStats};
pub use worker::{InputLoader, JobOutcome, JobWorker, OutputSink};
