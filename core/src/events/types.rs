use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::jobs::JobStatus;
use crate::pool::WorkerStatus;
use crate::provider::ProviderKind;

/// Worker pool lifecycle event
#[derive(Debug, Clone, Serialize)]
pub enum WorkerEvent {
    Created {
        worker_id: String,
        provider: ProviderKind,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        worker_id: String,
        old_status: WorkerStatus,
        new_status: WorkerStatus,
        job_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Removed {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    Restored {
        count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl WorkerEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Created { timestamp, .. }
            | Self::StatusChanged { timestamp, .. }
            | Self::Removed { timestamp, .. }
            | Self::Restored { timestamp, .. } => *timestamp,
        }
    }

    pub fn worker_id(&self) -> Option<&str> {
        match self {
            Self::Created { worker_id, .. }
            | Self::StatusChanged { worker_id, .. }
            | Self::Removed { worker_id, .. } => Some(worker_id),
            Self::Restored { .. } => None,
        }
    }
}

/// Job lifecycle event
#[derive(Debug, Clone, Serialize)]
pub enum JobEvent {
    Created {
        job_id: String,
        workflow: String,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        job_id: String,
        old_status: JobStatus,
        new_status: JobStatus,
        timestamp: DateTime<Utc>,
    },
    Assigned {
        job_id: String,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    Completed {
        job_id: String,
        success: bool,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Deleted {
        job_id: String,
        timestamp: DateTime<Utc>,
    },
    Restored {
        count: usize,
        pending: usize,
        timestamp: DateTime<Utc>,
    },
    Log {
        job_id: String,
        line: String,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Created { timestamp, .. }
            | Self::StatusChanged { timestamp, .. }
            | Self::Assigned { timestamp, .. }
            | Self::Completed { timestamp, .. }
            | Self::Deleted { timestamp, .. }
            | Self::Restored { timestamp, .. }
            | Self::Log { timestamp, .. } => *timestamp,
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Created { job_id, .. }
            | Self::StatusChanged { job_id, .. }
            | Self::Assigned { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Deleted { job_id, .. }
            | Self::Log { job_id, .. } => Some(job_id),
            Self::Restored { .. } => None,
        }
    }
}
