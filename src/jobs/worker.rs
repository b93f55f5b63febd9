//! Optional single-consumer worker that drives queued jobs through the pipeline.
//!
//! Nothing starts a worker implicitly. Callers that want jobs processed in-process
//! create one with an [`InputLoader`] (and optionally an [`OutputSink`]) and either
//! call [`JobWorker::process_next`] themselves or [`JobWorker::spawn`] a thread.

use super::job::{Job, JobStatus};
use crate::pipeline::RunReport;
use crate::service::CleaningService;
use anyhow::{Context as _, Result};
use polars::prelude::DataFrame;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolves a job's opaque `input_ref` to a table
pub trait InputLoader: Send + Sync {
    fn load(&self, input_ref: &str) -> Result<DataFrame>;
}

/// Receives the cleaned table of a finished job
pub trait OutputSink: Send + Sync {
    fn store(&self, job: &Job, frame: &DataFrame) -> Result<()>;
}

/// What happened to one processed job
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed { job_id: String, report: RunReport },
    Failed { job_id: String, message: String },
    Cancelled { job_id: String },
}

impl JobOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::Cancelled { job_id } => job_id,
        }
    }
}

pub struct JobWorker {
    service: Arc<CleaningService>,
    loader: Arc<dyn InputLoader>,
    sink: Option<Arc<dyn OutputSink>>,
    poll_interval: Duration,
}

impl JobWorker {
    pub fn new(service: Arc<CleaningService>, loader: Arc<dyn InputLoader>) -> Self {
        Self {
            service,
            loader,
            sink: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Claim and process the oldest pending job, if any
    pub fn process_next(&self) -> Option<JobOutcome> {
        let job = self.service.claim_next_job()?;
        Some(self.process_claimed(&job))
    }

    /// Process every pending job, oldest first
    pub fn drain(&self) -> Vec<JobOutcome> {
        std::iter::from_fn(|| self.process_next()).collect()
    }

    /// Run the worker loop on a named thread until `shutdown` fires
    pub fn spawn(self, shutdown: CancellationToken) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("neatdata-worker".to_owned())
            .spawn(move || {
                tracing::info!("Job worker started");
                while !shutdown.is_cancelled() {
                    if self.process_next().is_none() {
                        // idle
                        std::thread::sleep(self.poll_interval);
                    }
                }
                tracing::info!("Job worker stopped");
            })
            .context("Failed to spawn job worker thread")
    }

    fn process_claimed(&self, job: &Job) -> JobOutcome {
        let service = &self.service;
        let id = job.id.clone();

        service.update_progress(&id, 0, "reading_file", &format!("Loading {}", job.input_ref));
        let input = match self.loader.load(&job.input_ref) {
            Ok(df) => df,
            Err(e) => return self.failed(&id, format!("Failed to load input: {e:#}")),
        };

        let outcome = match service.run_job(job, &input) {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                tracing::info!("Job {id} stopped after cancellation");
                return JobOutcome::Cancelled { job_id: id };
            }
            Err(e) => return self.failed(&id, e.to_string()),
        };

        if let Some(sink) = &self.sink {
            service.update_progress(&id, 100, "saving_results", "Saving output");
            if let Err(e) = sink.store(job, &outcome.frame) {
                return self.failed(&id, format!("Failed to store output: {e:#}"));
            }
        }

        // a cancel that lands after the last step still wins
        if !service.complete_job(&id) {
            return JobOutcome::Cancelled { job_id: id };
        }
        JobOutcome::Completed {
            job_id: id,
            report: outcome.report,
        }
    }

    /// Record a failure, unless a cancel already made the job terminal
    fn failed(&self, id: &str, message: String) -> JobOutcome {
        if !self.service.fail_job(id, &message)
            && self
                .service
                .queue()
                .get(id)
                .is_some_and(|job| job.status == JobStatus::Cancelled)
        {
            tracing::info!("Job {id} was cancelled before its failure was recorded: {message}");
            return JobOutcome::Cancelled {
                job_id: id.to_owned(),
            };
        }
        JobOutcome::Failed {
            job_id: id.to_owned(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobQueue;
    use crate::progress::ProgressBroadcaster;
    use crate::transforms::{FnTransform, Params, Transform, TransformMeta, TransformRegistry};
    use polars::prelude::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemoryLoader(HashMap<String, DataFrame>);

    impl InputLoader for MemoryLoader {
        fn load(&self, input_ref: &str) -> Result<DataFrame> {
            self.0
                .get(input_ref)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown input {input_ref}"))
        }
    }

    #[derive(Default)]
    struct MemorySink(Mutex<Vec<(String, usize)>>);

    impl OutputSink for MemorySink {
        fn store(&self, job: &Job, frame: &DataFrame) -> Result<()> {
            self.0
                .lock()
                .map_err(|e| anyhow::anyhow!("sink lock poisoned: {e}"))?
                .push((job.id.clone(), frame.height()));
            Ok(())
        }
    }

    fn cities() -> PolarsResult<DataFrame> {
        DataFrame::new(vec![Column::new(
            "city".into(),
            [" Izmir", "Izmir ", "Bursa"],
        )])
    }

    fn setup() -> PolarsResult<(Arc<CleaningService>, JobWorker, Arc<MemorySink>)> {
        let service = Arc::new(CleaningService::new(Arc::new(
            TransformRegistry::builtins_only(),
        )));
        let sink = Arc::new(MemorySink::default());
        let worker = JobWorker::new(
            Arc::clone(&service),
            Arc::new(MemoryLoader(HashMap::from([("cities".to_owned(), cities()?)]))),
        )
        .with_sink(sink.clone());
        Ok((service, worker, sink))
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| (*k).to_owned()).collect()
    }

    #[test]
    fn test_drain_processes_in_fifo_order() -> anyhow::Result<()> {
        let (service, worker, sink) = setup()?;
        let first = service.submit_job("cities", keys(&["trim_spaces", "drop_duplicates"]));
        let second = service.submit_job("missing", keys(&["trim_spaces"]));

        let outcomes = worker.drain();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].job_id(), first.id);
        assert!(matches!(
            &outcomes[0],
            JobOutcome::Completed { report, .. } if report.rows_after == 2
        ));
        assert!(matches!(
            &outcomes[1],
            JobOutcome::Failed { message, .. } if message.contains("unknown input")
        ));

        let queue = service.queue();
        assert_eq!(
            queue.get(&first.id).map(|j| (j.status, j.progress_percent)),
            Some((JobStatus::Completed, 100))
        );
        assert_eq!(queue.get(&second.id).map(|j| j.status), Some(JobStatus::Failed));
        assert_eq!(
            sink.0.lock().map(|v| v.clone()).unwrap_or_default(),
            vec![(first.id, 2)]
        );
        assert!(worker.process_next().is_none());
        Ok(())
    }

    #[test]
    fn test_failing_step_fails_job() -> anyhow::Result<()> {
        let (service, worker, _) = setup()?;
        let mut params = Params::new();
        params.insert("keep".to_owned(), serde_json::json!("sideways"));
        let job = service.submit_job_with_params(
            "cities",
            keys(&["drop_duplicates"]),
            HashMap::from([("drop_duplicates".to_owned(), params)]),
        );

        let outcome = worker.process_next();
        assert!(matches!(outcome, Some(JobOutcome::Failed { .. })));
        let stored = service.queue().get(&job.id);
        assert!(stored.is_some_and(|j| {
            j.status == JobStatus::Failed
                && j.error_message.is_some_and(|m| m.contains("drop_duplicates"))
        }));
        Ok(())
    }

    #[test]
    fn test_cancel_during_failing_step_reports_cancelled() -> anyhow::Result<()> {
        let queue = Arc::new(JobQueue::new());
        let watched = Arc::clone(&queue);
        let cancel_then_fail: Arc<dyn Transform> = Arc::new(FnTransform::new(
            TransformMeta::new("cancel_then_fail", "Cancel then fail"),
            move |_: &DataFrame, _: &Params| {
                for job in watched.list_all() {
                    watched.cancel(&job.id).ok();
                }
                anyhow::bail!("step failed after the job was cancelled")
            },
        ));
        let service = Arc::new(CleaningService::with_parts(
            Arc::new(TransformRegistry::new(vec![cancel_then_fail], None)),
            Arc::clone(&queue),
            Arc::new(ProgressBroadcaster::new()),
        ));
        let worker = JobWorker::new(
            Arc::clone(&service),
            Arc::new(MemoryLoader(HashMap::from([("cities".to_owned(), cities()?)]))),
        );
        let job = service.submit_job("cities", keys(&["cancel_then_fail"]));

        let outcome = worker.process_next();
        assert!(matches!(
            &outcome,
            Some(JobOutcome::Cancelled { job_id }) if *job_id == job.id
        ));
        let stored = queue.get(&job.id);
        assert!(
            stored.is_some_and(|j| j.status == JobStatus::Cancelled && j.error_message.is_none())
        );
        Ok(())
    }

    #[test]
    fn test_spawned_worker_stops_on_shutdown() -> anyhow::Result<()> {
        let (service, worker, _) = setup()?;
        let job = service.submit_job("cities", keys(&["trim_spaces"]));
        let shutdown = CancellationToken::new();
        let handle = worker
            .with_poll_interval(Duration::from_millis(5))
            .spawn(shutdown.clone())?;

        for _ in 0..400 {
            if service.queue().get(&job.id).is_some_and(|j| j.is_terminal()) {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        shutdown.cancel();
        handle
            .join()
            .map_err(|panic| anyhow::anyhow!("worker panicked: {panic:?}"))?;
        assert_eq!(
            service.queue().get(&job.id).map(|j| j.status),
            Some(JobStatus::Completed)
        );
        Ok(())
    }
}
