//! In-memory job store with a FIFO admission list.

use super::job::{Job, JobStatus, clamp_percent};
use crate::transforms::Params;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Why a job operation was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    NotFound { id: String },
    /// The job is in a state that doesn't allow the operation
    Conflict { id: String, status: JobStatus },
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "Job {id} not found"),
            Self::Conflict { id, status } => {
                write!(f, "Job {id} cannot be changed (status: {status})")
            }
        }
    }
}

impl std::error::Error for JobError {}

/// Job counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    #[serde(rename = "total_jobs")]
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Per-transform parameter overrides, keyed by transform key
pub type JobParams = HashMap<String, Params>;

struct Entry {
    job: Job,
    cancel: CancellationToken,
    /// Released once the job is terminal
    params: JobParams,
}

impl Entry {
    fn finish(&mut self, status: JobStatus) {
        self.job.finish(status);
        self.params = JobParams::new();
    }
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<String, Entry>,
    /// Ids in submission order; only non-terminal jobs stay here
    fifo: VecDeque<String>,
    /// Submission sequence for stable listing
    order: Vec<String>,
}

impl QueueState {
    fn remove_from_fifo(&mut self, id: &str) {
        self.fifo.retain(|queued| queued != id);
    }
}

/// Thread-safe job store.
///
/// Every operation takes one mutex for the duration of a check-and-mutate, so
/// the identity map and the FIFO list never disagree. Nothing blocks on I/O
/// while the lock is held.
#[derive(Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a pending job at the back of the FIFO list
    pub fn submit(&self, input_ref: impl Into<String>, modules: Vec<String>) -> Job {
        self.submit_with_params(input_ref, modules, JobParams::new())
    }

    /// Like [`submit`](Self::submit), keeping parameter overrides for the job's run
    pub fn submit_with_params(
        &self,
        input_ref: impl Into<String>,
        modules: Vec<String>,
        params: JobParams,
    ) -> Job {
        let job = Job::new(input_ref, modules);
        let mut state = self.lock();
        state.fifo.push_back(job.id.clone());
        state.order.push(job.id.clone());
        state.jobs.insert(
            job.id.clone(),
            Entry {
                job: job.clone(),
                cancel: CancellationToken::new(),
                params,
            },
        );
        tracing::info!("Job {} submitted with {} module(s)", job.id, job.modules.len());
        job
    }

    /// `Pending -> Processing`, returning the started job.
    /// `None` for unknown or non-pending jobs.
    pub fn start(&self, id: &str) -> Option<Job> {
        let mut state = self.lock();
        let entry = state.jobs.get_mut(id)?;
        if entry.job.status != JobStatus::Pending {
            return None;
        }
        entry.job.status = JobStatus::Processing;
        entry.job.started_at = Some(Utc::now());
        tracing::debug!("Job {id} started");
        Some(entry.job.clone())
    }

    /// Atomically start the oldest pending job and return it
    pub fn claim_next(&self) -> Option<Job> {
        let mut state = self.lock();
        let id = state
            .fifo
            .iter()
            .find(|id| {
                state
                    .jobs
                    .get(id.as_str())
                    .is_some_and(|e| e.job.status == JobStatus::Pending)
            })?
            .clone();
        let entry = state.jobs.get_mut(&id)?;
        entry.job.status = JobStatus::Processing;
        entry.job.started_at = Some(Utc::now());
        Some(entry.job.clone())
    }

    /// `Processing -> Completed`, recording 100% progress in the same step
    pub fn complete(&self, id: &str) -> Option<Job> {
        let mut state = self.lock();
        let entry = state.jobs.get_mut(id)?;
        if entry.job.status != JobStatus::Processing {
            return None;
        }
        entry.job.progress_percent = 100;
        "completed".clone_into(&mut entry.job.current_step);
        "Processing finished".clone_into(&mut entry.job.step_message);
        entry.finish(JobStatus::Completed);
        let job = entry.job.clone();
        state.remove_from_fifo(id);
        tracing::info!("Job {id} completed");
        Some(job)
    }

    /// Any non-terminal state `-> Failed`, recording `message`
    pub fn fail(&self, id: &str, message: impl Into<String>) -> Option<Job> {
        let mut state = self.lock();
        let entry = state.jobs.get_mut(id)?;
        if entry.job.is_terminal() {
            return None;
        }
        let message = message.into();
        tracing::warn!("Job {id} failed: {message}");
        entry.job.error_message = Some(message);
        entry.finish(JobStatus::Failed);
        let job = entry.job.clone();
        state.remove_from_fifo(id);
        Some(job)
    }

    /// `Pending | Processing -> Cancelled`, triggering the job's cancellation token.
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`] for unknown ids, [`JobError::Conflict`] for terminal jobs.
    pub fn cancel(&self, id: &str) -> Result<Job, JobError> {
        let mut state = self.lock();
        let Some(entry) = state.jobs.get_mut(id) else {
            return Err(JobError::NotFound { id: id.to_owned() });
        };
        if entry.job.is_terminal() {
            return Err(JobError::Conflict {
                id: id.to_owned(),
                status: entry.job.status,
            });
        }
        entry.finish(JobStatus::Cancelled);
        entry.cancel.cancel();
        let job = entry.job.clone();
        state.remove_from_fifo(id);
        tracing::info!("Job {id} cancelled");
        Ok(job)
    }

    /// Record progress without touching the status. `percent` is clamped to 0..=100.
    pub fn update_progress(
        &self,
        id: &str,
        percent: i64,
        step: &str,
        message: &str,
    ) -> Option<Job> {
        let mut state = self.lock();
        let entry = state.jobs.get_mut(id)?;
        entry.job.progress_percent = clamp_percent(percent);
        step.clone_into(&mut entry.job.current_step);
        message.clone_into(&mut entry.job.step_message);
        Some(entry.job.clone())
    }

    /// Overrides given at submission. Empty once the job is terminal.
    pub fn params(&self, id: &str) -> JobParams {
        self.lock()
            .jobs
            .get(id)
            .map(|e| e.params.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.lock().jobs.get(id).map(|e| e.job.clone())
    }

    /// Token that fires when the job is cancelled
    pub fn cancellation_token(&self, id: &str) -> Option<CancellationToken> {
        self.lock().jobs.get(id).map(|e| e.cancel.clone())
    }

    /// Every job, in submission order
    pub fn list_all(&self) -> Vec<Job> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.jobs.get(id).map(|e| e.job.clone()))
            .collect()
    }

    /// Pending jobs, oldest first
    pub fn list_pending(&self) -> Vec<Job> {
        let state = self.lock();
        state
            .fifo
            .iter()
            .filter_map(|id| state.jobs.get(id))
            .filter(|e| e.job.status == JobStatus::Pending)
            .map(|e| e.job.clone())
            .collect()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        let mut stats = QueueStats {
            total: state.jobs.len(),
            ..QueueStats::default()
        };
        for entry in state.jobs.values() {
            match entry.job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue").field("stats", &self.stats()).finish()
    }
}
