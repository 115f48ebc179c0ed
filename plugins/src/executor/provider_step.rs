use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use agentflow_core::error::ExecutorError;
use agentflow_core::executor::limits;
use agentflow_core::executor::{Step, StepContext, StepExecutor, StepResult};
use agentflow_core::jobs::JobManager;
use agentflow_core::pool::{WorkerPool, WorkerStatus};
use agentflow_core::provider::{Provider, ProviderExit, ProviderRegistry, ProviderSession, ProviderStartArgs};
use agentflow_core::LogContext;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

/// Lines of stdout kept as the step output.
const OUTPUT_TAIL_LINES: usize = 200;

/// Runs a task step as one agent session.
///
/// When an IDLE worker of the step's provider exists it is held BUSY for the
/// duration of the step.
pub struct ProviderStepExecutor {
    providers: ProviderRegistry,
    pool: WorkerPool,
    jobs: Option<JobManager>,
    log: LogContext,
}

impl ProviderStepExecutor {
    pub fn new(providers: ProviderRegistry, pool: WorkerPool, log: LogContext) -> Self {
        Self {
            providers,
            pool,
            jobs: None,
            log: log.child("provider_executor"),
        }
    }

    /// Stream agent output lines into job log events.
    pub fn with_job_logs(mut self, jobs: JobManager) -> Self {
        self.jobs = Some(jobs);
        self
    }

    async fn run_session(
        &self,
        step: &Step,
        ctx: &StepContext,
        provider: Arc<dyn Provider>,
    ) -> Result<StepResult, ExecutorError> {
        let started_at = Utc::now();
        let args = ProviderStartArgs {
            workdir: ctx.workdir.clone(),
            prompt: ctx.render_prompt(step).unwrap_or_default(),
            envs: HashMap::from([
                ("AGENTFLOW_JOB_ID".to_string(), ctx.job_id.clone()),
                ("AGENTFLOW_STEP_ID".to_string(), step.id.clone()),
            ]),
        };

        let mut session = provider
            .spawn(&args)
            .await
            .map_err(|e| ExecutorError::Provider(format!("{}: {e:#}", provider.kind())))?;

        let timeout_secs = limits::effective_timeout_secs(step.timeout);
        let mut tail = VecDeque::new();
        let streamed = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.stream(session.as_mut(), &ctx.job_id, &mut tail),
        )
        .await;

        let output = tail.into_iter().collect::<Vec<_>>().join("\n");

        let exit = match streamed {
            Err(_) => {
                if let Err(e) = session.kill().await {
                    tracing::warn!(parent: self.log.span(), step_id = %step.id, error = %e, "kill after timeout failed");
                }
                return Ok(StepResult::failed(
                    &step.id,
                    started_at,
                    format!("timed out after {timeout_secs}s"),
                )
                .with_output(output));
            }
            Ok(Err(e)) => {
                return Ok(StepResult::failed(
                    &step.id,
                    started_at,
                    format!("session failed: {e:#}"),
                )
                .with_output(output));
            }
            Ok(Ok(exit)) => exit,
        };

        if !exit.success() {
            let stderr = exit.stderr_tail.trim();
            let error = if stderr.is_empty() {
                format!("exit code {}", exit.exit_code)
            } else {
                format!("exit code {}: {stderr}", exit.exit_code)
            };
            return Ok(StepResult::failed(&step.id, started_at, error).with_output(output));
        }

        let outputs = named_outputs(&output, &exit);
        Ok(StepResult::success(&step.id, started_at)
            .with_output(output)
            .with_outputs(outputs))
    }

    async fn stream(
        &self,
        session: &mut dyn ProviderSession,
        job_id: &str,
        tail: &mut VecDeque<String>,
    ) -> anyhow::Result<ProviderExit> {
        while let Some(line) = session.read_output().await? {
            if let Some(jobs) = &self.jobs {
                jobs.log(job_id, line.clone());
            }
            if tail.len() == OUTPUT_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        session.wait().await
    }
}

/// `output` and `exit_code`, plus the fields of a JSON object printed as the
/// last non-empty line.
fn named_outputs(output: &str, exit: &ProviderExit) -> HashMap<String, Value> {
    let mut outputs = HashMap::from([
        ("output".to_string(), Value::String(output.to_string())),
        ("exit_code".to_string(), Value::from(exit.exit_code)),
    ]);
    let last = output.lines().rev().find(|l| !l.trim().is_empty());
    if let Some(Ok(Value::Object(fields))) = last.map(|l| serde_json::from_str::<Value>(l.trim())) {
        outputs.extend(fields);
    }
    outputs
}

#[async_trait]
impl StepExecutor for ProviderStepExecutor {
    fn name(&self) -> &str {
        "provider"
    }

    async fn execute(&self, step: &Step, ctx: &StepContext) -> Result<StepResult, ExecutorError> {
        let kind = ctx.provider_for(step);
        let provider = self
            .providers
            .get(kind)
            .ok_or_else(|| ExecutorError::Provider(format!("no provider registered for {kind}")))?;

        let worker = self
            .pool
            .find_idle_worker(Some(kind))
            .and_then(|w| self.pool.occupy(&w.id, Some(&ctx.job_id)).ok());

        tracing::debug!(
            parent: self.log.span(),
            step_id = %step.id,
            provider = %kind,
            worker_id = worker.as_ref().map(|w| w.id.as_str()).unwrap_or("-"),
            "step started"
        );

        let result = self.run_session(step, ctx, provider).await;

        if let Some(worker) = worker {
            if result.is_err() {
                if let Err(e) = self.pool.update_status(&worker.id, WorkerStatus::Error) {
                    tracing::warn!(parent: self.log.span(), worker_id = %worker.id, error = %e, "worker not marked as error");
                }
            }
            if let Err(e) = self.pool.release(&worker.id) {
                tracing::warn!(parent: self.log.span(), worker_id = %worker.id, error = %e, "worker not released");
            }
        }

        result
    }
}
