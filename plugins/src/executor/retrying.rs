use std::sync::Arc;
use std::time::Duration;

use agentflow_core::error::ExecutorError;
use agentflow_core::executor::{RetryStrategyPlugin, Step, StepContext, StepExecutor, StepResult};
use agentflow_core::LogContext;
use async_trait::async_trait;

/// Retries a wrapped executor per step.
///
/// A step gets `retry + 1` attempts, capped by the strategy. Fatal errors
/// stop immediately. The final result records how many retries were used.
pub struct RetryingStepExecutor {
    inner: Arc<dyn StepExecutor>,
    strategy: Arc<dyn RetryStrategyPlugin>,
    log: LogContext,
}

impl RetryingStepExecutor {
    pub fn new(
        inner: Arc<dyn StepExecutor>,
        strategy: Arc<dyn RetryStrategyPlugin>,
        log: LogContext,
    ) -> Self {
        Self {
            inner,
            strategy,
            log: log.child("retry"),
        }
    }
}

#[async_trait]
impl StepExecutor for RetryingStepExecutor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, step: &Step, ctx: &StepContext) -> Result<StepResult, ExecutorError> {
        let attempts = self.strategy.attempts_for(step.retry);
        let mut attempt = 1;

        loop {
            let outcome = self.inner.execute(step, ctx).await;
            let error = match &outcome {
                Ok(result) if !result.is_failed() => None,
                Ok(result) => Some(result.error.clone().unwrap_or_default()),
                Err(e) => Some(e.to_string()),
            };

            let Some(error) = error else {
                return outcome.map(|r| with_retries(r, attempt));
            };

            if attempt >= attempts || self.strategy.is_fatal_error(&error) {
                return outcome.map(|r| with_retries(r, attempt));
            }

            let delay = self
                .strategy
                .next_delay(attempt, &error)
                .unwrap_or(Duration::ZERO);
            tracing::warn!(
                parent: self.log.span(),
                step_id = %step.id,
                attempt,
                attempts,
                delay_ms = delay.as_millis() as u64,
                strategy = self.strategy.name(),
                %error,
                "step attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn with_retries(mut result: StepResult, attempt: u32) -> StepResult {
    result.retries = Some(attempt - 1);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::strategies::LinearRetryPlugin;
    use agentflow_core::config::RetryConfig;
    use agentflow_core::provider::ProviderKind;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls.
    struct Flaky {
        failures: u32,
        error: &'static str,
        calls: AtomicU32,
    }

    #[async_trait]
    impl StepExecutor for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn execute(&self, step: &Step, _ctx: &StepContext) -> Result<StepResult, ExecutorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Ok(StepResult::failed(&step.id, Utc::now(), self.error))
            } else {
                Ok(StepResult::success(&step.id, Utc::now()))
            }
        }
    }

    fn retrying(failures: u32, error: &'static str) -> (RetryingStepExecutor, Arc<Flaky>) {
        let flaky = Arc::new(Flaky {
            failures,
            error,
            calls: AtomicU32::new(0),
        });
        let strategy = Arc::new(LinearRetryPlugin::new(RetryConfig {
            strategy: "linear".to_string(),
            base_delay_ms: 1,
            max_delay_ms: 2,
            max_attempts: 5,
        }));
        (
            RetryingStepExecutor::new(flaky.clone(), strategy, LogContext::disabled()),
            flaky,
        )
    }

    fn ctx() -> StepContext {
        StepContext::new("job", ".", ProviderKind::Claude)
    }

    #[tokio::test]
    async fn test_succeeds_within_retry_budget() {
        let (exec, flaky) = retrying(2, "exit code 1");
        let mut step = Step::task("build");
        step.retry = Some(2);

        let result = exec.execute(&step, &ctx()).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.retries, Some(2));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_declared_means_single_attempt() {
        let (exec, flaky) = retrying(1, "exit code 1");
        let result = exec.execute(&Step::task("build"), &ctx()).await.unwrap();
        assert!(result.is_failed());
        assert_eq!(result.retries, Some(0));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_early() {
        let (exec, flaky) = retrying(3, "spawn: No such file or directory");
        let mut step = Step::task("build");
        step.retry = Some(3);

        let result = exec.execute(&step, &ctx()).await.unwrap();
        assert!(result.is_failed());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }
}
