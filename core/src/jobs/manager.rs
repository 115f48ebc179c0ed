use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use super::types::{Job, JobStatus, NewJob};
use crate::error::JobError;
use crate::events::{JobEvent, ObserverRegistry, Subscription};
use crate::logging::LogContext;
use crate::provider::ProviderKind;
use crate::state::StateTransition;

#[derive(Default)]
struct JobBook {
    jobs: HashMap<String, Job>,
    /// Creation (or snapshot) order, used for listing.
    order: Vec<String>,
    pending: VecDeque<String>,
}

impl JobBook {
    fn get_mut(&mut self, id: &str) -> Result<&mut Job, JobError> {
        self.jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    fn dequeue(&mut self, id: &str) {
        self.pending.retain(|p| p != id);
    }
}

/// Job manager. Cloning yields another handle to the same records.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Mutex<JobBook>>,
    observers: ObserverRegistry<JobEvent>,
    log: LogContext,
}

impl JobManager {
    pub fn new(log: LogContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(JobBook::default())),
            observers: ObserverRegistry::new(),
            log: log.child("job_manager"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobBook> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription<JobEvent>
    where
        F: Fn(&JobEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn create(&self, new_job: NewJob) -> Job {
        let job = Job {
            id: Uuid::new_v4().to_string(),
            workflow: new_job.workflow,
            worker_id: None,
            status: JobStatus::Pending,
            target_dir: new_job.target_dir,
            provider: new_job.provider,
            variables: new_job.variables,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            error: None,
        };

        {
            let mut book = self.lock();
            book.jobs.insert(job.id.clone(), job.clone());
            book.order.push(job.id.clone());
            book.pending.push_back(job.id.clone());
        }

        tracing::info!(
            parent: self.log.span(),
            job_id = %job.id,
            workflow = %job.workflow,
            provider = %job.provider,
            "job created"
        );
        self.observers.emit(&JobEvent::Created {
            job_id: job.id.clone(),
            workflow: job.workflow.clone(),
            timestamp: job.created_at,
        });
        job
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.lock().jobs.get(id).cloned()
    }

    /// All jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        let book = self.lock();
        book.order
            .iter()
            .filter_map(|id| book.jobs.get(id).cloned())
            .collect()
    }

    pub fn list_by_status(&self, status: JobStatus) -> Vec<Job> {
        self.list()
            .into_iter()
            .filter(|j| j.status == status)
            .collect()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.lock().pending.iter().cloned().collect()
    }

    pub fn is_cancelled(&self, id: &str) -> bool {
        self.lock()
            .jobs
            .get(id)
            .map_or(false, |j| j.status == JobStatus::Cancelled)
    }

    /// First queued job matching the provider filter; the queue is not modified.
    pub fn next_pending(&self, provider: Option<ProviderKind>) -> Option<Job> {
        let book = self.lock();
        book.pending
            .iter()
            .filter_map(|id| book.jobs.get(id))
            .find(|j| provider.map_or(true, |p| j.provider == p))
            .cloned()
    }

    pub fn assign(&self, job_id: &str, worker_id: &str) -> Result<Job, JobError> {
        let job = {
            let mut book = self.lock();
            let job = book.get_mut(job_id)?;
            if job.status != JobStatus::Pending {
                return Err(JobError::NotPending {
                    id: job_id.to_string(),
                    status: job.status,
                });
            }
            job.worker_id = Some(worker_id.to_string());
            let job = job.clone();
            book.dequeue(job_id);
            job
        };

        tracing::info!(parent: self.log.span(), job_id, worker_id, "job assigned");
        self.observers.emit(&JobEvent::Assigned {
            job_id: job_id.to_string(),
            worker_id: worker_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(job)
    }

    pub fn start(&self, job_id: &str) -> Result<Job, JobError> {
        self.transition(job_id, JobStatus::Running, None).map(|(job, _)| job)
    }

    pub fn complete(
        &self,
        job_id: &str,
        success: bool,
        error: Option<String>,
    ) -> Result<Job, JobError> {
        let status = if success {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        let (job, changed) = self.transition(job_id, status, error)?;
        if !changed {
            return Ok(job);
        }
        self.observers.emit(&JobEvent::Completed {
            job_id: job_id.to_string(),
            success,
            error: job.error.clone(),
            timestamp: job.ended_at.unwrap_or_else(Utc::now),
        });
        Ok(job)
    }

    pub fn cancel(&self, job_id: &str) -> Result<Job, JobError> {
        {
            let book = self.lock();
            let job = book
                .jobs
                .get(job_id)
                .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
            if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
                return Err(JobError::AlreadyFinished {
                    id: job_id.to_string(),
                    status: job.status,
                });
            }
        }
        self.transition(job_id, JobStatus::Cancelled, None).map(|(job, _)| job)
    }

    /// Apply a status change. The flag is `false` for a same-status no-op,
    /// which emits nothing.
    fn transition(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<(Job, bool), JobError> {
        let (old_status, job) = {
            let mut book = self.lock();
            let job = book.get_mut(job_id)?;
            StateTransition::validate(job_id, job.status, status)?;
            let old_status = job.status;
            if old_status == status {
                return Ok((job.clone(), false));
            }

            let now = Utc::now();
            job.status = status;
            match status {
                JobStatus::Running => job.started_at = Some(now),
                JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                    job.ended_at = Some(now);
                    if error.is_some() {
                        job.error = error;
                    }
                }
                JobStatus::Pending => {}
            }
            let job = job.clone();
            book.dequeue(job_id);
            (old_status, job)
        };

        tracing::info!(
            parent: self.log.span(),
            job_id,
            from = %old_status,
            to = %status,
            "job status changed"
        );
        self.observers.emit(&JobEvent::StatusChanged {
            job_id: job_id.to_string(),
            old_status,
            new_status: status,
            timestamp: Utc::now(),
        });
        Ok((job, true))
    }

    /// Remove a finished job. Active jobs must be cancelled first.
    pub fn delete(&self, job_id: &str) -> Result<Job, JobError> {
        let job = {
            let mut book = self.lock();
            let status = book
                .jobs
                .get(job_id)
                .map(|j| j.status)
                .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
            if matches!(status, JobStatus::Running | JobStatus::Pending) {
                return Err(JobError::StillActive {
                    id: job_id.to_string(),
                    status,
                });
            }
            book.order.retain(|id| id != job_id);
            book.dequeue(job_id);
            book.jobs
                .remove(job_id)
                .ok_or_else(|| JobError::NotFound(job_id.to_string()))?
        };

        tracing::info!(parent: self.log.span(), job_id, "job deleted");
        self.observers.emit(&JobEvent::Deleted {
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(job)
    }

    /// Publish a log line for a job.
    pub fn log(&self, job_id: &str, line: impl Into<String>) {
        self.observers.emit(&JobEvent::Log {
            job_id: job_id.to_string(),
            line: line.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> Vec<Job> {
        self.list()
    }

    /// Replace all state with a persisted snapshot.
    ///
    /// Only jobs persisted as PENDING are re-queued, in snapshot order.
    pub fn restore(&self, jobs: Vec<Job>) {
        let (count, pending) = {
            let mut book = self.lock();
            *book = JobBook::default();
            for job in jobs {
                if job.status == JobStatus::Pending {
                    book.pending.push_back(job.id.clone());
                }
                book.order.push(job.id.clone());
                book.jobs.insert(job.id.clone(), job);
            }
            (book.jobs.len(), book.pending.len())
        };

        tracing::info!(parent: self.log.span(), count, pending, "jobs restored");
        self.observers.emit(&JobEvent::Restored {
            count,
            pending,
            timestamp: Utc::now(),
        });
    }

    /// Drain observers. Returns how many were registered.
    pub fn shutdown(&self) -> usize {
        self.observers.drain()
    }
}
