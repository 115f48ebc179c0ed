use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use super::types::{Worker, WorkerStatus};
use crate::error::PoolError;
use crate::events::{ObserverRegistry, Subscription, WorkerEvent};
use crate::logging::LogContext;
use crate::provider::ProviderKind;
use crate::state::StateTransition;

struct PoolInner {
    max_workers: usize,
    /// Creation order; `find_idle_worker` returns the first match.
    workers: Vec<Worker>,
}

impl PoolInner {
    fn find_mut(&mut self, id: &str) -> Result<&mut Worker, PoolError> {
        self.workers
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| PoolError::WorkerNotFound(id.to_string()))
    }
}

/// Worker pool manager.
///
/// Cloning yields another handle to the same pool. The lock is never held
/// across an await or while observers run.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<Mutex<PoolInner>>,
    observers: ObserverRegistry<WorkerEvent>,
    log: LogContext,
}

impl WorkerPool {
    pub fn new(max_workers: usize, log: LogContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                max_workers,
                workers: Vec::new(),
            })),
            observers: ObserverRegistry::new(),
            log: log.child("worker_pool"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription<WorkerEvent>
    where
        F: Fn(&WorkerEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn max_workers(&self) -> usize {
        self.lock().max_workers
    }

    pub fn create_worker(&self, provider: ProviderKind) -> Result<Worker, PoolError> {
        let worker = {
            let mut inner = self.lock();
            if inner.workers.len() >= inner.max_workers {
                tracing::warn!(
                    parent: self.log.span(),
                    max = inner.max_workers,
                    "worker pool exhausted"
                );
                return Err(PoolError::Exhausted {
                    max: inner.max_workers,
                });
            }
            let worker = Worker::new(Uuid::new_v4().to_string(), provider);
            inner.workers.push(worker.clone());
            worker
        };

        tracing::info!(parent: self.log.span(), worker_id = %worker.id, %provider, "worker created");
        self.observers.emit(&WorkerEvent::Created {
            worker_id: worker.id.clone(),
            provider,
            timestamp: worker.created_at,
        });
        Ok(worker)
    }

    pub fn get(&self, id: &str) -> Option<Worker> {
        self.lock().workers.iter().find(|w| w.id == id).cloned()
    }

    /// All workers in creation order.
    pub fn list(&self) -> Vec<Worker> {
        self.lock().workers.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find_idle_worker(&self, provider: Option<ProviderKind>) -> Option<Worker> {
        self.lock()
            .workers
            .iter()
            .find(|w| w.is_idle() && provider.map_or(true, |p| w.provider == p))
            .cloned()
    }

    pub fn idle_count(&self, provider: Option<ProviderKind>) -> usize {
        self.lock()
            .workers
            .iter()
            .filter(|w| w.is_idle() && provider.map_or(true, |p| w.provider == p))
            .count()
    }

    /// The single transition-validating mutation point for worker status.
    pub fn update_status(&self, id: &str, status: WorkerStatus) -> Result<Worker, PoolError> {
        self.apply(id, status, false, |_| {})
    }

    /// IDLE → RUNNING, recording the owned job.
    pub fn assign_job(&self, id: &str, job_id: &str) -> Result<Worker, PoolError> {
        let job_id = job_id.to_string();
        self.apply(id, WorkerStatus::Running, true, move |w| {
            w.current_job = Some(job_id)
        })
    }

    /// IDLE → BUSY for a single step on behalf of `job_id`.
    pub fn occupy(&self, id: &str, job_id: Option<&str>) -> Result<Worker, PoolError> {
        let job_id = job_id.map(str::to_string);
        self.apply(id, WorkerStatus::Busy, true, move |w| w.current_job = job_id)
    }

    /// Back to IDLE, clearing the current job.
    pub fn release(&self, id: &str) -> Result<Worker, PoolError> {
        self.apply(id, WorkerStatus::Idle, false, |w| w.current_job = None)
    }

    fn apply<F>(
        &self,
        id: &str,
        status: WorkerStatus,
        require_idle: bool,
        mutate: F,
    ) -> Result<Worker, PoolError>
    where
        F: FnOnce(&mut Worker),
    {
        let (old_status, worker) = {
            let mut inner = self.lock();
            let worker = inner.find_mut(id)?;
            if require_idle && !worker.is_idle() {
                return Err(PoolError::WorkerNotIdle {
                    id: id.to_string(),
                    status: worker.status,
                });
            }
            StateTransition::validate(id, worker.status, status)?;
            let old_status = worker.status;
            worker.status = status;
            worker.last_activity = Utc::now();
            mutate(worker);
            (old_status, worker.clone())
        };

        if old_status != status {
            tracing::debug!(
                parent: self.log.span(),
                worker_id = %id,
                from = %old_status,
                to = %status,
                "worker status changed"
            );
            self.observers.emit(&WorkerEvent::StatusChanged {
                worker_id: id.to_string(),
                old_status,
                new_status: status,
                job_id: worker.current_job.clone(),
                timestamp: worker.last_activity,
            });
        }
        Ok(worker)
    }

    pub fn remove_worker(&self, id: &str) -> Result<Worker, PoolError> {
        let removed = {
            let mut inner = self.lock();
            let pos = inner
                .workers
                .iter()
                .position(|w| w.id == id)
                .ok_or_else(|| PoolError::WorkerNotFound(id.to_string()))?;
            if inner.workers[pos].status == WorkerStatus::Running {
                return Err(PoolError::WorkerRunning(id.to_string()));
            }
            inner.workers.remove(pos)
        };

        tracing::info!(parent: self.log.span(), worker_id = %id, "worker removed");
        self.observers.emit(&WorkerEvent::Removed {
            worker_id: id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(removed)
    }

    /// IDLE and RUNNING workers become STOPPED; workers in other states are left alone.
    pub fn stop_all(&self) -> usize {
        let targets: Vec<String> = self
            .lock()
            .workers
            .iter()
            .filter(|w| matches!(w.status, WorkerStatus::Idle | WorkerStatus::Running))
            .map(|w| w.id.clone())
            .collect();

        let mut stopped = 0;
        for id in targets {
            match self.update_status(&id, WorkerStatus::Stopped) {
                Ok(_) => stopped += 1,
                Err(e) => {
                    tracing::warn!(parent: self.log.span(), worker_id = %id, error = %e, "stop failed")
                }
            }
        }
        stopped
    }

    /// Persistable copy of every worker record.
    pub fn snapshot(&self) -> Vec<Worker> {
        self.list()
    }

    /// Replace the pool contents with persisted records.
    pub fn restore(&self, workers: Vec<Worker>) {
        let count = workers.len();
        self.lock().workers = workers;
        tracing::info!(parent: self.log.span(), count, "worker pool restored");
        self.observers.emit(&WorkerEvent::Restored {
            count,
            timestamp: Utc::now(),
        });
    }

    /// Drain observers. Returns how many were registered.
    pub fn shutdown(&self) -> usize {
        self.observers.drain()
    }
}
