use crate::jobs::{Job, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Wire message sent to job subscribers on every state or progress change.
///
/// `status` is the upper-case job status, or `ERROR` for lookups of unknown jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: String,
    pub status: String,
    pub progress_percent: u8,
    pub current_step: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub error_details: Option<String>,
}

impl ProgressEvent {
    /// Snapshot of a job's current state
    pub fn from_job(job: &Job) -> Self {
        let status = job.status.as_str().to_uppercase();
        let current_step = if job.current_step.is_empty() {
            default_step(job.status).to_owned()
        } else {
            job.current_step.clone()
        };
        let message = if job.step_message.is_empty() {
            format!("Job {} status: {}", job.id, job.status)
        } else {
            job.step_message.clone()
        };

        Self {
            job_id: job.id.clone(),
            status,
            progress_percent: job.progress_percent,
            current_step,
            message,
            timestamp: Utc::now(),
            error_details: job.error_message.clone(),
        }
    }

    /// Reply for a subscription to a job the queue doesn't know
    pub fn not_found(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_owned(),
            status: "ERROR".to_owned(),
            progress_percent: 0,
            current_step: "error".to_owned(),
            message: format!("Job {job_id} not found"),
            timestamp: Utc::now(),
            error_details: Some("Job ID does not exist in queue".to_owned()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn default_step(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "waiting",
        JobStatus::Processing => "processing",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "error",
        JobStatus::Cancelled => "cancelled",
    }
}

/// Commands a client may send over its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ClientCommand {
    Unsubscribe,
    Ping,
}

impl ClientCommand {
    /// `None` for invalid JSON or unknown commands, which are ignored
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

pub fn pong_reply() -> Value {
    json!({ "status": "pong", "timestamp": Utc::now() })
}

pub fn unsubscribed_reply(job_id: Option<&str>) -> Value {
    json!({ "status": "unsubscribed", "job_id": job_id })
}

pub fn connected_reply(channel: &str) -> Value {
    json!({
        "status": "connected",
        "channel": channel,
        "message": format!("Subscribed to {channel} updates"),
        "timestamp": Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobQueue;

    #[test]
    fn test_event_wire_shape() -> serde_json::Result<()> {
        let queue = JobQueue::new();
        let job = queue.submit("x", vec![]);
        let event = ProgressEvent::from_job(&job);
        let value: Value = serde_json::from_str(&event.to_json()?)?;

        assert_eq!(value["job_id"], job.id.as_str());
        assert_eq!(value["status"], "PENDING");
        assert_eq!(value["current_step"], "waiting");
        assert_eq!(value["progress_percent"], 0);
        assert!(value["error_details"].is_null());
        assert!(value["timestamp"].is_string());
        Ok(())
    }

    #[test]
    fn test_failed_job_carries_error_details() {
        let queue = JobQueue::new();
        let job = queue.submit("x", vec![]);
        queue.fail(&job.id, "disk full");
        let event = queue.get(&job.id).map(|j| ProgressEvent::from_job(&j));
        assert_eq!(event.as_ref().map(|e| e.status.as_str()), Some("FAILED"));
        assert_eq!(event.and_then(|e| e.error_details).as_deref(), Some("disk full"));
    }

    #[test]
    fn test_not_found_event() {
        let event = ProgressEvent::not_found("ghost");
        assert_eq!(event.status, "ERROR");
        assert_eq!(event.message, "Job ghost not found");
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ClientCommand::parse(r#"{"command": "ping"}"#), Some(ClientCommand::Ping));
        assert_eq!(
            ClientCommand::parse(r#"{"command": "unsubscribe", "extra": 1}"#),
            Some(ClientCommand::Unsubscribe)
        );
        assert_eq!(ClientCommand::parse("not json"), None);
        assert_eq!(ClientCommand::parse(r#"{"command": "dance"}"#), None);
    }

    #[test]
    fn test_replies() {
        assert_eq!(pong_reply()["status"], "pong");
        assert_eq!(unsubscribed_reply(Some("j1"))["job_id"], "j1");
        let welcome = connected_reply("all");
        assert_eq!(welcome["channel"], "all");
        assert_eq!(welcome["message"], "Subscribed to all updates");
    }
}
