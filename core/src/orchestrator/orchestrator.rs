use std::sync::Arc;

use crate::error::{EngineError, PoolError};
use crate::executor::{RunStatus, StepExecutor, WorkflowEngine, WorkflowRun};
use crate::jobs::{Job, JobManager, NewJob};
use crate::logging::LogContext;
use crate::pool::{Worker, WorkerPool};
use crate::storage::Storage;

use super::source::WorkflowSource;

/// Runs queued jobs on pool workers through the workflow engine.
pub struct Orchestrator {
    pool: WorkerPool,
    jobs: JobManager,
    engine: WorkflowEngine,
    workflows: Arc<dyn WorkflowSource>,
    storage: Option<Arc<dyn Storage>>,
    log: LogContext,
}

impl Orchestrator {
    pub fn new(
        pool: WorkerPool,
        jobs: JobManager,
        executor: Arc<dyn StepExecutor>,
        workflows: Arc<dyn WorkflowSource>,
        log: LogContext,
    ) -> Self {
        let log = log.child("orchestrator");
        let engine = WorkflowEngine::new(pool.clone(), executor, log.clone()).with_jobs(jobs.clone());
        Self {
            pool,
            jobs,
            engine,
            workflows,
            storage: None,
            log,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Queue a job. Returns its id.
    pub fn submit(&self, new_job: NewJob) -> String {
        self.jobs.create(new_job).id
    }

    /// Run the first queued job that can get a worker of its provider.
    ///
    /// Jobs are tried in queue order; a job whose provider has no idle
    /// worker while the pool is full is skipped, not waited on. Returns
    /// `Ok(None)` when no queued job can be started.
    pub async fn dispatch_next(&self) -> Result<Option<WorkflowRun>, EngineError> {
        for job_id in self.jobs.pending_ids() {
            let Some(job) = self.jobs.get(&job_id) else {
                continue;
            };
            match self.obtain_worker(&job)? {
                Some(worker) => return self.run_job(&job.id, &worker.id).await.map(Some),
                None => {
                    tracing::debug!(parent: self.log.span(), job_id = %job.id, provider = %job.provider, "no worker available");
                }
            }
        }
        Ok(None)
    }

    /// Dispatch queued jobs one after another until none can be started.
    pub async fn run_until_idle(&self) -> Result<Vec<WorkflowRun>, EngineError> {
        let mut runs = Vec::new();
        while let Some(run) = self.dispatch_next().await? {
            runs.push(run);
        }
        Ok(runs)
    }

    fn obtain_worker(&self, job: &Job) -> Result<Option<Worker>, EngineError> {
        if let Some(worker) = self.pool.find_idle_worker(Some(job.provider)) {
            return Ok(Some(worker));
        }
        match self.pool.create_worker(job.provider) {
            Ok(worker) => Ok(Some(worker)),
            Err(PoolError::Exhausted { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Run one job on one worker from assignment to completion.
    ///
    /// The worker is released and state persisted whatever the outcome. A
    /// job cancelled while running keeps its CANCELLED status.
    pub async fn run_job(&self, job_id: &str, worker_id: &str) -> Result<WorkflowRun, EngineError> {
        self.jobs.assign(job_id, worker_id)?;
        if let Err(e) = self.pool.assign_job(worker_id, job_id) {
            self.jobs.complete(job_id, false, Some(e.to_string()))?;
            self.persist().await?;
            return Err(e.into());
        }

        let result = self.execute(job_id).await;

        if let Err(e) = self.pool.release(worker_id) {
            tracing::warn!(parent: self.log.span(), worker_id, error = %e, "worker not released");
        }
        self.persist().await?;
        result
    }

    async fn execute(&self, job_id: &str) -> Result<WorkflowRun, EngineError> {
        let job = self.jobs.start(job_id)?;

        let steps = match self.workflows.load(&job.workflow).await {
            Ok(steps) => steps,
            Err(e) => {
                let err = EngineError::Workflow {
                    workflow: job.workflow.clone(),
                    message: format!("{e:#}"),
                };
                tracing::error!(parent: self.log.span(), job_id, error = %err, "workflow load failed");
                self.jobs.complete(job_id, false, Some(err.to_string()))?;
                return Err(err);
            }
        };

        let run = self.engine.run(&job, &steps).await;

        if run.status == RunStatus::Cancelled || self.jobs.is_cancelled(job_id) {
            tracing::info!(parent: self.log.span(), job_id, "job cancelled during run");
        } else {
            self.jobs.complete(
                job_id,
                run.status == RunStatus::Completed,
                run.error.clone(),
            )?;
        }
        Ok(run)
    }

    /// Cancel a pending or running job. A running job stops at its next level.
    pub fn cancel(&self, job_id: &str) -> Result<Job, EngineError> {
        Ok(self.jobs.cancel(job_id)?)
    }

    /// Save job and worker records. A no-op without storage.
    pub async fn persist(&self) -> Result<(), EngineError> {
        let Some(storage) = self.storage.as_ref() else {
            return Ok(());
        };
        storage
            .save_jobs(&self.jobs.snapshot())
            .await
            .map_err(|e| EngineError::Storage(format!("{e:#}")))?;
        storage
            .save_workers(&self.pool.snapshot())
            .await
            .map_err(|e| EngineError::Storage(format!("{e:#}")))?;
        Ok(())
    }

    /// Reload job and worker records. Returns how many jobs are queued again.
    pub async fn restore(&self) -> Result<usize, EngineError> {
        let Some(storage) = self.storage.as_ref() else {
            return Ok(0);
        };
        let jobs = storage
            .load_jobs()
            .await
            .map_err(|e| EngineError::Storage(format!("{e:#}")))?;
        let workers = storage
            .load_workers()
            .await
            .map_err(|e| EngineError::Storage(format!("{e:#}")))?;

        self.pool.restore(workers);
        self.jobs.restore(jobs);
        Ok(self.jobs.pending_ids().len())
    }

    /// Stop all workers, persist, then drain both observer registries.
    ///
    /// Returns the number of workers stopped.
    pub async fn shutdown(&self) -> Result<usize, EngineError> {
        let stopped = self.pool.stop_all();
        let persisted = self.persist().await;

        let observers = self.pool.shutdown() + self.jobs.shutdown();
        tracing::info!(parent: self.log.span(), stopped, observers, "orchestrator shut down");

        persisted.map(|_| stopped)
    }
}
