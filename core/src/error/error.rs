use thiserror::Error;

use super::{ErrorKind, ExecutorError};
use crate::jobs::JobStatus;
use crate::pool::WorkerStatus;
use crate::state::TransitionError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool exhausted: maximum of {max} workers reached")]
    Exhausted { max: usize },
    #[error("worker not found: {0}")]
    WorkerNotFound(String),
    #[error("worker '{0}' is running and cannot be removed")]
    WorkerRunning(String),
    #[error("worker '{id}' is {status}, expected IDLE")]
    WorkerNotIdle { id: String, status: WorkerStatus },
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl PoolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Exhausted { .. } => ErrorKind::PoolExhausted,
            Self::WorkerNotFound(_) => ErrorKind::NotFound,
            Self::WorkerRunning(_) | Self::WorkerNotIdle { .. } | Self::Transition(_) => {
                ErrorKind::StateTransition
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("job '{id}' is {status}, only PENDING jobs can be assigned")]
    NotPending { id: String, status: JobStatus },
    #[error("job '{id}' already finished as {status} and cannot be cancelled")]
    AlreadyFinished { id: String, status: JobStatus },
    #[error("job '{id}' is {status}; cancel it before deleting")]
    StillActive { id: String, status: JobStatus },
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::StateTransition,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("stage list is empty")]
    EmptyStageList,
    #[error("unknown stage: {0}")]
    UnknownStage(String),
    #[error("stage '{0}' is the last stage; there is no next stage")]
    EndOfStages(String),
    #[error("stage checkpoint failed: {0}")]
    Checkpoint(String),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyStageList | Self::UnknownStage(_) => ErrorKind::Config,
            Self::EndOfStages(_) => ErrorKind::StateTransition,
            Self::Checkpoint(_) => ErrorKind::Storage,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
    #[error("invalid log filter: {0}")]
    LogFilter(String),
}

/// Umbrella error returned by the orchestrator
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("job error: {0}")]
    Job(#[from] JobError),
    #[error("stage error: {0}")]
    Stage(#[from] StageError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("workflow '{workflow}' could not be loaded: {message}")]
    Workflow { workflow: String, message: String },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Executor(e) => e.kind(),
            Self::Pool(e) => e.kind(),
            Self::Job(e) => e.kind(),
            Self::Stage(e) => e.kind(),
            Self::Config(_) => ErrorKind::Config,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Workflow { .. } => ErrorKind::NotFound,
        }
    }
}
