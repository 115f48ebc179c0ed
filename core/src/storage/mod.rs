//! Persistence boundary for jobs, workers and stage loop state.
//!
//! Records travel as JSON; timestamps serialize as RFC 3339 and rehydrate
//! into `DateTime<Utc>`.

mod memory;

pub use memory::MemoryStorage;

use async_trait::async_trait;

use crate::jobs::Job;
use crate::pool::Worker;
use crate::stage::StageState;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn save_jobs(&self, jobs: &[Job]) -> anyhow::Result<()>;

    async fn load_jobs(&self) -> anyhow::Result<Vec<Job>>;

    async fn save_workers(&self, workers: &[Worker]) -> anyhow::Result<()>;

    async fn load_workers(&self) -> anyhow::Result<Vec<Worker>>;

    async fn save_stage_state(&self, key: &str, state: &StageState) -> anyhow::Result<()>;

    /// `None` when nothing was saved under `key`.
    async fn load_stage_state(&self, key: &str) -> anyhow::Result<Option<StageState>>;
}
