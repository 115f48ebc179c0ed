use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// One end-to-end request to run a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Target workflow id.
    pub workflow: String,
    pub worker_id: Option<String>,
    pub status: JobStatus,
    /// Directory the agent runs in.
    pub target_dir: PathBuf,
    pub provider: ProviderKind,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Job {
    pub fn is_active(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Running)
    }
}

/// Parameters for [`JobManager::create`](super::JobManager::create).
#[derive(Debug, Clone)]
pub struct NewJob {
    pub workflow: String,
    pub target_dir: PathBuf,
    pub provider: ProviderKind,
    pub variables: HashMap<String, String>,
}

impl NewJob {
    pub fn new(workflow: impl Into<String>, target_dir: impl Into<PathBuf>, provider: ProviderKind) -> Self {
        Self {
            workflow: workflow.into(),
            target_dir: target_dir.into(),
            provider,
            variables: HashMap::new(),
        }
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}
