//! Explicit service context tying the registry, engine, queue and broadcaster together.
//!
//! Construct one [`CleaningService`] at startup and share it through an `Arc`
//! with whatever transport or worker needs it. Job transitions made through the
//! service publish one [`ProgressEvent`] to the job's subscribers and the same
//! JSON to the broadcast channel.

use crate::error::ResultExt as _;
use crate::jobs::{Job, JobError, JobParams, JobQueue};
use crate::pipeline::{PipelineEngine, PipelineError, RunOutcome, StepEvent};
use crate::progress::session;
use crate::progress::{Connection, ConnectionId, ProgressBroadcaster, ProgressEvent};
use crate::transforms::TransformRegistry;
use polars::prelude::DataFrame;
use std::path::Path;
use std::sync::Arc;

pub struct CleaningService {
    engine: PipelineEngine,
    queue: Arc<JobQueue>,
    broadcaster: Arc<ProgressBroadcaster>,
}

impl CleaningService {
    pub fn new(registry: Arc<TransformRegistry>) -> Self {
        Self::with_parts(
            registry,
            Arc::new(JobQueue::new()),
            Arc::new(ProgressBroadcaster::new()),
        )
    }

    pub fn with_parts(
        registry: Arc<TransformRegistry>,
        queue: Arc<JobQueue>,
        broadcaster: Arc<ProgressBroadcaster>,
    ) -> Self {
        Self {
            engine: PipelineEngine::new(registry),
            queue,
            broadcaster,
        }
    }

    pub fn registry(&self) -> &Arc<TransformRegistry> {
        self.engine.registry()
    }

    pub fn engine(&self) -> &PipelineEngine {
        &self.engine
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn broadcaster(&self) -> &Arc<ProgressBroadcaster> {
        &self.broadcaster
    }

    /// Synchronous path: resolve `selection` in order and run it on `df`
    pub fn clean(
        &self,
        df: &DataFrame,
        selection: &[String],
        overrides: &JobParams,
    ) -> Result<RunOutcome, PipelineError> {
        let steps = self.engine.build_ordered(selection, overrides);
        PipelineEngine::run(&steps, df)
    }

    /// Load `input` from disk and clean it.
    ///
    /// `selection: None` runs every built-in in registry order.
    ///
    /// # Errors
    ///
    /// [`NeatError::Other`](crate::error::NeatError::Other) when the file can't be read,
    /// [`NeatError::Pipeline`](crate::error::NeatError::Pipeline) when a step fails.
    pub fn clean_file(
        &self,
        input: &Path,
        selection: Option<&[String]>,
        overrides: &JobParams,
    ) -> crate::error::Result<RunOutcome> {
        let df = crate::io::load_table(input)
            .with_context(|| format!("Failed to load {}", input.display()))?;
        let steps = match selection {
            Some(keys) => self.engine.build_ordered(keys, overrides),
            None => self.engine.build(None, None, overrides),
        };
        tracing::info!("Cleaning {} with {} step(s)", input.display(), steps.len());
        Ok(PipelineEngine::run(&steps, &df)?)
    }

    pub fn submit_job(&self, input_ref: impl Into<String>, modules: Vec<String>) -> Job {
        self.submit_job_with_params(input_ref, modules, JobParams::new())
    }

    /// Submit with per-transform parameter overrides used when the job runs
    pub fn submit_job_with_params(
        &self,
        input_ref: impl Into<String>,
        modules: Vec<String>,
        params: JobParams,
    ) -> Job {
        let job = self.queue.submit_with_params(input_ref, modules, params);
        self.notify(&job);
        job
    }

    pub fn start_job(&self, id: &str) -> bool {
        self.publish_change(self.queue.start(id))
    }

    /// Start the oldest pending job and return it
    pub fn claim_next_job(&self) -> Option<Job> {
        let job = self.queue.claim_next()?;
        self.notify(&job);
        Some(job)
    }

    pub fn update_progress(&self, id: &str, percent: i64, step: &str, message: &str) -> bool {
        self.publish_change(self.queue.update_progress(id, percent, step, message))
    }

    /// Complete a processing job; the completion event carries 100%
    pub fn complete_job(&self, id: &str) -> bool {
        self.publish_change(self.queue.complete(id))
    }

    pub fn fail_job(&self, id: &str, message: &str) -> bool {
        self.publish_change(self.queue.fail(id, message))
    }

    pub fn cancel_job(&self, id: &str) -> Result<Job, JobError> {
        let job = self.queue.cancel(id)?;
        self.notify(&job);
        Ok(job)
    }

    /// Run a claimed job's pipeline on `input`, reporting progress after every step.
    ///
    /// The job's cancellation token is checked between steps. The job's state is
    /// not finalised here; callers decide between complete and fail.
    pub fn run_job(&self, job: &Job, input: &DataFrame) -> Result<RunOutcome, PipelineError> {
        let overrides = self.queue.params(&job.id);
        let steps = self.engine.build_ordered(&job.modules, &overrides);
        let token = self.queue.cancellation_token(&job.id).unwrap_or_default();

        PipelineEngine::run_with(&steps, input, &token, &mut |event| match event {
            StepEvent::Started { index, total, step } => {
                self.update_progress(
                    &job.id,
                    percent(index, total),
                    "processing",
                    &format!("Step {}/{}: {}", index + 1, total, step.name),
                );
            }
            StepEvent::Finished { index, total, step, .. } => {
                self.update_progress(
                    &job.id,
                    percent(index + 1, total),
                    "processing",
                    &format!("Finished {}", step.name),
                );
            }
        })
    }

    /// Attach a connection to one job's stream, sending the current snapshot
    pub fn open_job_stream(&self, connection: Arc<dyn Connection>, job_id: &str) -> ConnectionId {
        session::open_job_stream(&self.broadcaster, connection, job_id, || {
            self.queue.get(job_id)
        })
    }

    pub fn open_broadcast_stream(&self, connection: Arc<dyn Connection>) -> ConnectionId {
        session::open_broadcast_stream(&self.broadcaster, connection)
    }

    /// Publish the snapshot a queue transition produced, if it happened
    fn publish_change(&self, changed: Option<Job>) -> bool {
        match changed {
            Some(job) => {
                self.notify(&job);
                true
            }
            None => false,
        }
    }

    /// Publish the job's state to its subscribers and to the broadcast channel
    fn notify(&self, job: &Job) {
        let event = ProgressEvent::from_job(job);
        self.broadcaster.publish(&job.id, &event);
        match serde_json::to_value(&event) {
            Ok(message) => {
                self.broadcaster.publish_all(&message);
            }
            Err(e) => tracing::error!("Failed to serialise progress event: {e}"),
        }
    }
}

impl std::fmt::Debug for CleaningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleaningService")
            .field("registry", self.engine.registry())
            .field("queue", &self.queue)
            .field("broadcaster", &self.broadcaster)
            .finish_non_exhaustive()
    }
}

fn percent(done: usize, total: usize) -> i64 {
    if total == 0 {
        return 100;
    }
    i64::try_from(done * 100 / total).unwrap_or(100)
}
