use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

use crate::jobs::{Job, JobManager};
use crate::logging::LogContext;
use crate::pool::WorkerPool;

use super::context::StepContext;
use super::graph::StepGraph;
use super::parallel::ParallelStepExecutor;
use super::traits::StepExecutor;
use super::types::{RunStatus, Step, StepCondition, StepKind, StepResult, WorkflowRun};

/// Drives a job's step graph level by level.
pub struct WorkflowEngine {
    executor: Arc<dyn StepExecutor>,
    parallel: ParallelStepExecutor,
    jobs: Option<JobManager>,
    log: LogContext,
}

impl WorkflowEngine {
    pub fn new(pool: WorkerPool, executor: Arc<dyn StepExecutor>, log: LogContext) -> Self {
        let log = log.child("workflow_engine");
        Self {
            parallel: ParallelStepExecutor::new(pool, executor.clone(), log.clone()),
            executor,
            jobs: None,
            log,
        }
    }

    /// Consult `jobs` for cancellation before every level.
    pub fn with_jobs(mut self, jobs: JobManager) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn parallel(&self) -> &ParallelStepExecutor {
        &self.parallel
    }

    /// Run `steps` for `job`.
    ///
    /// Graph errors produce a failed run with no step results. A failed step
    /// halts the run after its level settles; results produced so far are
    /// kept.
    pub async fn run(&self, job: &Job, steps: &[Step]) -> WorkflowRun {
        let started_at = Utc::now();
        let mut step_results = Vec::with_capacity(steps.len());

        let finish = |status: RunStatus, step_results: Vec<StepResult>, error: Option<String>| {
            WorkflowRun {
                job_id: job.id.clone(),
                status,
                step_results,
                started_at,
                ended_at: Utc::now(),
                error,
            }
        };

        let groups = match StepGraph::from_steps(steps).and_then(|g| g.resolve_order()) {
            Ok(groups) => groups,
            Err(e) => {
                tracing::error!(parent: self.log.span(), job_id = %job.id, error = %e, "step graph rejected");
                return finish(RunStatus::Failed, step_results, Some(e.to_string()));
            }
        };

        tracing::info!(
            parent: self.log.span(),
            job_id = %job.id,
            workflow = %job.workflow,
            steps = steps.len(),
            levels = groups.len(),
            "run started"
        );

        let mut ctx = StepContext::from_job(job);

        for group in &groups {
            if self.is_cancelled(&job.id) {
                tracing::info!(parent: self.log.span(), job_id = %job.id, level = group.level, "run cancelled");
                return finish(
                    RunStatus::Cancelled,
                    step_results,
                    Some("job cancelled".to_string()),
                );
            }

            tracing::debug!(parent: self.log.span(), job_id = %job.id, level = group.level, steps = ?group.ids(), "level started");

            let settled = join_all(group.steps.iter().map(|step| self.execute_step(step, &ctx))).await;

            let failures: Vec<String> = settled
                .iter()
                .filter(|r| r.is_failed())
                .map(|r| {
                    format!(
                        "{}: {}",
                        r.step_id,
                        r.error.as_deref().unwrap_or("unknown error")
                    )
                })
                .collect();

            for result in &settled {
                ctx.record(result);
            }
            step_results.extend(settled);

            if !failures.is_empty() {
                let error = format!("one or more steps failed: {}", failures.join("; "));
                tracing::warn!(parent: self.log.span(), job_id = %job.id, level = group.level, %error, "run failed");
                return finish(RunStatus::Failed, step_results, Some(error));
            }
        }

        tracing::info!(parent: self.log.span(), job_id = %job.id, results = step_results.len(), "run completed");
        finish(RunStatus::Completed, step_results, None)
    }

    fn is_cancelled(&self, job_id: &str) -> bool {
        self.jobs
            .as_ref()
            .is_some_and(|jobs| jobs.is_cancelled(job_id))
    }

    fn execute_step<'a>(&'a self, step: &'a Step, ctx: &'a StepContext) -> BoxFuture<'a, StepResult> {
        async move {
            let started_at = Utc::now();
            match step.kind {
                StepKind::Task => match self.executor.execute(step, ctx).await {
                    Ok(result) => result,
                    Err(e) => StepResult::failed(&step.id, started_at, e.to_string()),
                },
                StepKind::Parallel => {
                    self.parallel
                        .execute_parallel_with(&step.steps, ctx, &step.id, |nested| {
                            self.execute_step(nested, ctx)
                        })
                        .await
                }
                StepKind::PassThrough => {
                    StepResult::success(&step.id, started_at).with_outputs(ctx.resolve_inputs(step))
                }
                StepKind::DataCollection => collect_data(step, ctx, started_at),
                StepKind::Conditional => self.execute_conditional(step, ctx).await,
            }
        }
        .boxed()
    }

    async fn execute_conditional(&self, step: &Step, ctx: &StepContext) -> StepResult {
        let started_at = Utc::now();
        let Some(condition) = step.condition.as_ref() else {
            return StepResult::failed(&step.id, started_at, "conditional step has no condition");
        };

        if !condition_holds(condition, ctx) {
            tracing::debug!(parent: self.log.span(), step_id = %step.id, input = %condition.input, "condition false, skipping");
            return StepResult::skipped(&step.id, started_at, format!("condition on '{}' not met", condition.input));
        }

        let mut outputs = HashMap::with_capacity(step.steps.len());
        for nested in &step.steps {
            let result = self.execute_step(nested, ctx).await;
            if result.is_failed() {
                return StepResult::failed(
                    &step.id,
                    started_at,
                    format!(
                        "step '{}' failed: {}",
                        nested.id,
                        result.error.as_deref().unwrap_or("unknown error")
                    ),
                );
            }
            outputs.insert(nested.id.clone(), Value::Object(result.outputs.into_iter().collect()));
        }

        StepResult::success(&step.id, started_at)
            .with_output(format!("executed {} steps", step.steps.len()))
            .with_outputs(outputs)
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("executor", &self.executor.name())
            .field("cancellable", &self.jobs.is_some())
            .finish()
    }
}

fn collect_data(step: &Step, ctx: &StepContext, started_at: chrono::DateTime<Utc>) -> StepResult {
    let mut outputs: HashMap<String, Value> = step
        .depends_on
        .iter()
        .map(|dep| {
            let collected = ctx
                .outputs_of(dep)
                .map(|o| Value::Object(o.clone().into_iter().collect()))
                .unwrap_or(Value::Null);
            (dep.clone(), collected)
        })
        .collect();
    outputs.extend(ctx.resolve_inputs(step));

    StepResult::success(&step.id, started_at)
        .with_output(format!("collected {} dependencies", step.depends_on.len()))
        .with_outputs(outputs)
}

fn condition_holds(condition: &StepCondition, ctx: &StepContext) -> bool {
    let value = ctx.lookup(&condition.input);
    match &condition.equals {
        Some(expected) => &value == expected,
        None => is_truthy(&value),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "false",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;
    use serde_json::json;

    fn ctx_with(step_id: &str, name: &str, value: Value) -> StepContext {
        let mut ctx = StepContext::new("job", ".", ProviderKind::Claude);
        ctx.record(
            &StepResult::success(step_id, Utc::now())
                .with_outputs(HashMap::from([(name.to_string(), value)])),
        );
        ctx
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!("false")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!("yes")));
        assert!(is_truthy(&json!(2)));
        assert!(is_truthy(&json!({"a": 1})));
    }

    #[test]
    fn test_condition_equals() {
        let ctx = ctx_with("check", "verdict", json!("pass"));
        let pass = StepCondition {
            input: "check.verdict".to_string(),
            equals: Some(json!("pass")),
        };
        let fail = StepCondition {
            input: "check.verdict".to_string(),
            equals: Some(json!("fail")),
        };
        assert!(condition_holds(&pass, &ctx));
        assert!(!condition_holds(&fail, &ctx));
    }

    #[test]
    fn test_collect_data_keys_by_dependency() {
        let ctx = ctx_with("lint", "warnings", json!(2));
        let step = Step::new("report", StepKind::DataCollection)
            .depends_on(["lint", "fmt"])
            .with_input("count", "lint.warnings");

        let result = collect_data(&step, &ctx, Utc::now());
        assert!(result.is_success());
        assert_eq!(result.outputs["lint"], json!({"warnings": 2}));
        assert_eq!(result.outputs["fmt"], Value::Null);
        assert_eq!(result.outputs["count"], json!(2));
    }
}
