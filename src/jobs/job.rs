use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Completed, failed and cancelled jobs never change state again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked cleaning request.
///
/// Values handed out by [`JobQueue`](super::JobQueue) are snapshots; state only
/// changes through the queue's transition methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Opaque reference to the input table, resolved by an input loader
    pub input_ref: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Transform selection exactly as submitted
    pub modules: Vec<String>,
    pub error_message: Option<String>,
    /// Always within 0..=100
    pub progress_percent: u8,
    pub current_step: String,
    pub step_message: String,
}

impl Job {
    pub(crate) fn new(input_ref: impl Into<String>, modules: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            input_ref: input_ref.into(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            modules,
            error_message: None,
            progress_percent: 0,
            current_step: String::new(),
            step_message: String::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move into a terminal state, stamping `completed_at`
    pub(crate) fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}

/// Clamp any requested percentage into 0..=100
pub fn clamp_percent(percent: i64) -> u8 {
    // lossless after the clamp
    percent.clamp(0, 100) as u8
}
