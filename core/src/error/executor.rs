use thiserror::Error;

use super::ErrorKind;

/// Errors raised while building, validating or executing a step graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Duplicate step ID: {0}")]
    DuplicateStepId(String),

    #[error("Dependency not found: step '{step_id}' depends on '{missing_dep}'")]
    DependencyNotFound {
        step_id: String,
        missing_dep: String,
    },

    #[error("Circular dependency detected at step '{step_id}': {path}")]
    CircularDependency { step_id: String, path: String },

    /// Leveling stalled although validation passed.
    #[error("Unresolvable step graph: {remaining} step(s) could not be placed in any level")]
    UnresolvableGraph { remaining: usize },

    #[error("Provider error: {0}")]
    Provider(String),
}

impl ExecutorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateStepId(_)
            | Self::DependencyNotFound { .. }
            | Self::CircularDependency { .. } => ErrorKind::Validation,
            Self::UnresolvableGraph { .. } => ErrorKind::Internal,
            Self::Provider(_) => ErrorKind::Execution,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}
