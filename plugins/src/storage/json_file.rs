use std::path::{Path, PathBuf};

use agentflow_core::jobs::Job;
use agentflow_core::pool::Worker;
use agentflow_core::stage::StageState;
use agentflow_core::storage::Storage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

const JOBS_FILE: &str = "jobs.json";
const WORKERS_FILE: &str = "workers.json";
const STAGES_DIR: &str = "stages";

/// Pretty-printed JSON documents under one directory.
///
/// ```text
/// <root>/jobs.json
/// <root>/workers.json
/// <root>/stages/<key>.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    root: PathBuf,
}

impl JsonFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stage_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(STAGES_DIR).join(format!("{name}.json"))
    }

    async fn write<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("replace {}", path.display()))?;
        Ok(())
    }

    async fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("parse {}", path.display()))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn save_jobs(&self, jobs: &[Job]) -> Result<()> {
        self.write(&self.root.join(JOBS_FILE), jobs).await
    }

    async fn load_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.read(&self.root.join(JOBS_FILE)).await?.unwrap_or_default())
    }

    async fn save_workers(&self, workers: &[Worker]) -> Result<()> {
        self.write(&self.root.join(WORKERS_FILE), workers).await
    }

    async fn load_workers(&self) -> Result<Vec<Worker>> {
        Ok(self.read(&self.root.join(WORKERS_FILE)).await?.unwrap_or_default())
    }

    async fn save_stage_state(&self, key: &str, state: &StageState) -> Result<()> {
        self.write(&self.stage_path(key), state).await
    }

    async fn load_stage_state(&self, key: &str) -> Result<Option<StageState>> {
        self.read(&self.stage_path(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_core::jobs::{JobManager, NewJob};
    use agentflow_core::pool::WorkerPool;
    use agentflow_core::provider::ProviderKind;
    use agentflow_core::LogContext;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("state"));

        assert!(storage.load_jobs().await.unwrap().is_empty());
        assert!(storage.load_workers().await.unwrap().is_empty());
        assert_eq!(storage.load_stage_state("any").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path());

        let jobs = JobManager::new(LogContext::disabled());
        let job = jobs.create(NewJob::new("review", "/srv/repo", ProviderKind::Gemini));
        jobs.start(&job.id).unwrap();
        let pool = WorkerPool::new(2, LogContext::disabled());
        pool.create_worker(ProviderKind::Gemini).unwrap();

        storage.save_jobs(&jobs.snapshot()).await.unwrap();
        storage.save_workers(&pool.snapshot()).await.unwrap();

        assert!(dir.path().join(JOBS_FILE).exists());
        assert_eq!(storage.load_jobs().await.unwrap(), jobs.snapshot());
        assert_eq!(storage.load_workers().await.unwrap(), pool.snapshot());

        let text = std::fs::read_to_string(dir.path().join(JOBS_FILE)).unwrap();
        assert!(text.contains("\"status\": \"RUNNING\""));
    }

    #[tokio::test]
    async fn test_stage_state_key_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path());
        let state = StageState {
            stage: "check".to_string(),
            iteration: 1,
            error: Some("flaky".to_string()),
            last_decision: None,
        };

        storage.save_stage_state("../job/1", &state).await.unwrap();

        assert!(dir.path().join("stages").join("___job_1.json").exists());
        assert_eq!(storage.load_stage_state("../job/1").await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(JOBS_FILE), "not json").unwrap();
        let storage = JsonFileStorage::new(dir.path());
        assert!(storage.load_jobs().await.is_err());
    }
}
