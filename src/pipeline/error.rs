use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the run a step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// The transform returned an error
    Apply,
    /// The run was cancelled before the step started
    Cancelled,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A pipeline run stopped at `step_key`. No partial output is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineError {
    pub step_key: String,
    pub step_name: String,
    pub stage: PipelineStage,
    pub message: String,
}

impl PipelineError {
    pub fn apply(step_key: &str, step_name: &str, err: &anyhow::Error) -> Self {
        Self {
            step_key: step_key.to_owned(),
            step_name: step_name.to_owned(),
            stage: PipelineStage::Apply,
            message: format!("{err:#}"),
        }
    }

    pub fn cancelled(step_key: &str, step_name: &str) -> Self {
        Self {
            step_key: step_key.to_owned(),
            step_name: step_name.to_owned(),
            stage: PipelineStage::Cancelled,
            message: "run was cancelled".to_owned(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.stage == PipelineStage::Cancelled
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline step '{}' failed during {}: {}",
            self.step_key, self.stage, self.message
        )
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_step_and_stage() {
        let err = PipelineError::apply("trim", "Trim", &anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "Pipeline step 'trim' failed during apply: boom");
        assert!(!err.is_cancelled());
        assert!(PipelineError::cancelled("trim", "Trim").is_cancelled());
    }
}
