#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;

pub use error::{ConfigError, EngineError, JobError, PoolError, StageError};
pub use executor::ExecutorError;

pub use crate::state::TransitionError;

/// Coarse error taxonomy shared by every error type in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed graph: cycle, missing dependency, duplicate id.
    Validation,
    /// Invalid worker/job status change or an operation illegal in the current status.
    StateTransition,
    /// Worker creation beyond the configured capacity.
    PoolExhausted,
    /// A step or provider run failed.
    Execution,
    /// Internal invariant violation.
    Internal,
    Config,
    Storage,
    NotFound,
}
