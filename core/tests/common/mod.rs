#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentflow_core::error::ExecutorError;
use agentflow_core::executor::{Step, StepContext, StepExecutor, StepResult};
use agentflow_core::jobs::{Job, JobManager, NewJob};
use agentflow_core::pool::WorkerPool;
use agentflow_core::provider::ProviderKind;
use agentflow_core::LogContext;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

type Hook = Box<dyn Fn(&str) + Send + Sync>;

/// Step executor that records what ran and how many ran at once.
///
/// Successful steps publish `{"result": "<id> done"}`.
#[derive(Default)]
pub struct ScriptedExecutor {
    delay: Duration,
    fail: HashSet<String>,
    raise: HashSet<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started_with: Mutex<HashMap<String, usize>>,
    executed: Mutex<Vec<String>>,
    prompts: Mutex<HashMap<String, String>>,
    on_execute: Option<Hook>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    /// Report a failed result for `id`.
    pub fn failing(mut self, id: &str) -> Self {
        self.fail.insert(id.to_string());
        self
    }

    /// Return an executor error for `id`.
    pub fn raising(mut self, id: &str) -> Self {
        self.raise.insert(id.to_string());
        self
    }

    pub fn on_execute<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_execute = Some(Box::new(hook));
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Steps in flight, this one included, when `id` started.
    pub fn concurrency_at(&self, id: &str) -> Option<usize> {
        self.started_with.lock().unwrap().get(id).copied()
    }

    pub fn prompt_of(&self, id: &str) -> Option<String> {
        self.prompts.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, step: &Step, ctx: &StepContext) -> Result<StepResult, ExecutorError> {
        let started_at = Utc::now();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.started_with.lock().unwrap().insert(step.id.clone(), now);

        if let Some(prompt) = ctx.render_prompt(step) {
            self.prompts.lock().unwrap().insert(step.id.clone(), prompt);
        }
        if let Some(hook) = &self.on_execute {
            hook(&step.id);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(step.id.clone());

        if self.raise.contains(&step.id) {
            return Err(ExecutorError::Provider(format!("{} could not start", step.id)));
        }
        if self.fail.contains(&step.id) {
            return Ok(StepResult::failed(&step.id, started_at, "exit code 1"));
        }
        Ok(StepResult::success(&step.id, started_at)
            .with_output("ok")
            .with_outputs(HashMap::from([(
                "result".to_string(),
                json!(format!("{} done", step.id)),
            )])))
    }
}

pub fn task(id: &str, deps: &[&str]) -> Step {
    Step::task(id).depends_on(deps.iter().copied())
}

/// Pool holding `idle` IDLE Claude workers.
pub fn pool_with_idle(idle: usize, max: usize) -> WorkerPool {
    let pool = WorkerPool::new(max, LogContext::disabled());
    for _ in 0..idle {
        pool.create_worker(ProviderKind::Claude).unwrap();
    }
    pool
}

pub fn job(jobs: &JobManager, workflow: &str) -> Job {
    jobs.create(NewJob::new(workflow, "/tmp/agentflow-test", ProviderKind::Claude))
}

pub fn ctx() -> StepContext {
    StepContext::new("job-test", "/tmp/agentflow-test", ProviderKind::Claude)
}
