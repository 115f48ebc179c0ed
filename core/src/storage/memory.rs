use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::Storage;
use crate::jobs::Job;
use crate::pool::Worker;
use crate::stage::StageState;

#[derive(Default)]
struct Documents {
    jobs: Option<String>,
    workers: Option<String>,
    stages: HashMap<String, String>,
}

/// In-process storage keeping serialized JSON documents.
#[derive(Default)]
pub struct MemoryStorage {
    docs: Mutex<Documents>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Documents> {
        match self.docs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Raw JSON of the saved job list, if any.
    pub fn jobs_document(&self) -> Option<String> {
        self.lock().jobs.clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_jobs(&self, jobs: &[Job]) -> anyhow::Result<()> {
        let doc = serde_json::to_string(jobs)?;
        self.lock().jobs = Some(doc);
        Ok(())
    }

    async fn load_jobs(&self) -> anyhow::Result<Vec<Job>> {
        let doc = self.lock().jobs.clone();
        match doc {
            Some(doc) => Ok(serde_json::from_str(&doc)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_workers(&self, workers: &[Worker]) -> anyhow::Result<()> {
        let doc = serde_json::to_string(workers)?;
        self.lock().workers = Some(doc);
        Ok(())
    }

    async fn load_workers(&self) -> anyhow::Result<Vec<Worker>> {
        let doc = self.lock().workers.clone();
        match doc {
            Some(doc) => Ok(serde_json::from_str(&doc)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_stage_state(&self, key: &str, state: &StageState) -> anyhow::Result<()> {
        let doc = serde_json::to_string(state)?;
        self.lock().stages.insert(key.to_string(), doc);
        Ok(())
    }

    async fn load_stage_state(&self, key: &str) -> anyhow::Result<Option<StageState>> {
        let doc = self.lock().stages.get(key).cloned();
        doc.map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;
    use crate::pool::WorkerStatus;
    use crate::provider::ProviderKind;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn job() -> Job {
        Job {
            id: "job-1".to_string(),
            workflow: "fix-bug".to_string(),
            worker_id: None,
            status: JobStatus::Pending,
            target_dir: "/tmp/repo".into(),
            provider: ProviderKind::Codex,
            variables: HashMap::from([("ticket".to_string(), "42".to_string())]),
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_jobs_round_trip_with_rfc3339_timestamps() {
        let storage = MemoryStorage::new();
        assert!(storage.load_jobs().await.unwrap().is_empty());

        let saved = vec![job()];
        storage.save_jobs(&saved).await.unwrap();

        let doc = storage.jobs_document().unwrap();
        let raw: serde_json::Value = serde_json::from_str(&doc).unwrap();
        let created = raw[0]["created_at"].as_str().unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(created).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), saved[0].created_at);
        assert_eq!(storage.load_jobs().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_workers_and_stage_state() {
        let storage = MemoryStorage::new();
        let mut worker = Worker::new("w-1".to_string(), ProviderKind::Claude);
        worker.status = WorkerStatus::Error;
        storage.save_workers(&[worker.clone()]).await.unwrap();
        assert_eq!(storage.load_workers().await.unwrap(), vec![worker]);

        assert_eq!(storage.load_stage_state("run-1").await.unwrap(), None);
        let state = StageState {
            stage: "test".to_string(),
            iteration: 2,
            error: None,
            last_decision: None,
        };
        storage.save_stage_state("run-1", &state).await.unwrap();
        assert_eq!(storage.load_stage_state("run-1").await.unwrap(), Some(state));
    }
}
