use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

use crate::logging::LogContext;
use crate::pool::WorkerPool;

use super::context::StepContext;
use super::traits::StepExecutor;
use super::types::{Step, StepKind, StepResult};

/// Runs co-level steps in sub-batches sized by idle worker capacity.
#[derive(Clone)]
pub struct ParallelStepExecutor {
    pool: WorkerPool,
    executor: Arc<dyn StepExecutor>,
    log: LogContext,
}

impl ParallelStepExecutor {
    pub fn new(pool: WorkerPool, executor: Arc<dyn StepExecutor>, log: LogContext) -> Self {
        Self {
            pool,
            executor,
            log: log.child("parallel_executor"),
        }
    }

    /// Execute `steps` and aggregate them into one result named `batch_id`.
    ///
    /// The batch width is the number of IDLE workers (at least one), read
    /// again before every sub-batch. Steps of one sub-batch run concurrently
    /// and are all awaited; the first failure stops further sub-batches.
    pub async fn execute_parallel(
        &self,
        steps: &[Step],
        ctx: &StepContext,
        batch_id: &str,
    ) -> StepResult {
        let executor = &self.executor;
        self.execute_parallel_with(steps, ctx, batch_id, |step| {
            async move {
                let started_at = Utc::now();
                executor
                    .execute(step, ctx)
                    .await
                    .unwrap_or_else(|e| StepResult::failed(&step.id, started_at, e.to_string()))
            }
            .boxed()
        })
        .await
    }

    /// Same batching as [`execute_parallel`](Self::execute_parallel), with
    /// each step run through `dispatch` instead of the step executor.
    pub async fn execute_parallel_with<'a, F>(
        &self,
        steps: &'a [Step],
        ctx: &'a StepContext,
        batch_id: &str,
        dispatch: F,
    ) -> StepResult
    where
        F: Fn(&'a Step) -> BoxFuture<'a, StepResult>,
    {
        let started_at = Utc::now();

        if steps.is_empty() {
            return StepResult::success(batch_id, started_at).with_output("executed 0 steps");
        }

        if let Some(nested) = steps.iter().find(|s| s.kind == StepKind::Parallel) {
            tracing::warn!(parent: self.log.span(), batch_id, step_id = %nested.id, "nested parallel step rejected");
            return StepResult::failed(
                batch_id,
                started_at,
                format!("nested parallel not supported: {}", nested.id),
            );
        }

        tracing::trace!(parent: self.log.span(), batch_id, job_id = %ctx.job_id, steps = steps.len(), "parallel batch started");

        let mut outputs = HashMap::with_capacity(steps.len());
        let mut next = 0;

        while next < steps.len() {
            let width = self.pool.idle_count(None).max(1);
            let end = (next + width).min(steps.len());
            let chunk = &steps[next..end];

            tracing::debug!(
                parent: self.log.span(),
                batch_id,
                from = next,
                size = chunk.len(),
                "dispatching sub-batch"
            );

            let settled = join_all(chunk.iter().map(&dispatch)).await;

            for (step, result) in chunk.iter().zip(settled) {
                if !result.is_failed() {
                    outputs.insert(
                        step.id.clone(),
                        Value::Object(result.outputs.into_iter().collect()),
                    );
                    continue;
                }

                let error = result.error.unwrap_or_else(|| "unknown error".to_string());
                tracing::warn!(parent: self.log.span(), batch_id, step_id = %step.id, %error, "parallel step failed");
                return StepResult::failed(
                    batch_id,
                    started_at,
                    format!("step '{}' failed: {}", step.id, error),
                );
            }

            next = end;
        }

        StepResult::success(batch_id, started_at)
            .with_output(format!("executed {} steps", steps.len()))
            .with_outputs(outputs)
    }
}

impl std::fmt::Debug for ParallelStepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelStepExecutor")
            .field("executor", &self.executor.name())
            .finish()
    }
}
