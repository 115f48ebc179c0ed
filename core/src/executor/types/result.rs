use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

/// Result of executing a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Captured output (may be truncated by the executor)
    pub output: Option<String>,
    pub error: Option<String>,
    /// Number of retries used
    pub retries: Option<u32>,
    /// Named outputs for downstream steps
    #[serde(default)]
    pub outputs: HashMap<String, serde_json::Value>,
}

impl StepResult {
    fn finished(step_id: &str, status: StepStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            step_id: step_id.to_string(),
            status,
            started_at,
            ended_at: Utc::now(),
            output: None,
            error: None,
            retries: None,
            outputs: HashMap::new(),
        }
    }

    pub fn success(step_id: &str, started_at: DateTime<Utc>) -> Self {
        Self::finished(step_id, StepStatus::Success, started_at)
    }

    pub fn failed(step_id: &str, started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        let mut result = Self::finished(step_id, StepStatus::Failed, started_at);
        result.error = Some(error.into());
        result
    }

    pub fn skipped(step_id: &str, started_at: DateTime<Utc>, reason: impl Into<String>) -> Self {
        let mut result = Self::finished(step_id, StepStatus::Skipped, started_at);
        result.output = Some(reason.into());
        result
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_outputs(mut self, outputs: HashMap<String, serde_json::Value>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Result of running a job's step graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub job_id: String,
    pub status: RunStatus,
    /// Per-step results in execution order
    pub step_results: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl WorkflowRun {
    pub fn result(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step_id == step_id)
    }

    pub fn failed_steps(&self) -> Vec<&str> {
        self.step_results
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| r.step_id.as_str())
            .collect()
    }
}
