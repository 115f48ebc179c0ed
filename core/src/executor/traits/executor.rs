use async_trait::async_trait;

use crate::error::ExecutorError;
use crate::executor::context::StepContext;
use crate::executor::types::{Step, StepResult};

/// Single-step execution collaborator.
///
/// Run failures, timeouts and non-zero exits are reported as a failed
/// [`StepResult`]. An `Err` means the executor itself broke; callers treat it
/// as a failure of that step.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, step: &Step, ctx: &StepContext) -> Result<StepResult, ExecutorError>;
}
