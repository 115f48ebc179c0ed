use std::path::Path;
use std::sync::Arc;

use agentflow_core::config::{EngineConfig, RetryConfig, StorageConfig};
use agentflow_core::executor::{RetryStrategyPlugin, StepExecutor};
use agentflow_core::jobs::JobManager;
use agentflow_core::pool::WorkerPool;
use agentflow_core::provider::{ProviderKind, ProviderRegistry};
use agentflow_core::storage::Storage;
use agentflow_core::LogContext;

use crate::executor::strategies::{ExponentialBackoffPlugin, LinearRetryPlugin};
use crate::executor::{ProviderStepExecutor, RetryingStepExecutor};
use crate::provider::CodeCliProvider;
use crate::storage::JsonFileStorage;

pub fn build_retry_strategy(cfg: &RetryConfig) -> Arc<dyn RetryStrategyPlugin> {
    match cfg.strategy.as_str() {
        "linear" => Arc::new(LinearRetryPlugin::new(cfg.clone())),
        // Anything else falls back to exponential backoff.
        _ => Arc::new(ExponentialBackoffPlugin::new(cfg.clone())),
    }
}

/// One process provider per kind, from the configured command lines.
pub fn build_provider_registry(cfg: &EngineConfig) -> ProviderRegistry {
    ProviderKind::ALL
        .into_iter()
        .fold(ProviderRegistry::new(), |registry, kind| {
            let command = cfg.providers.command_for(kind).clone();
            registry.with(Arc::new(CodeCliProvider::new(kind, command)))
        })
}

pub fn build_storage(cfg: &StorageConfig) -> Arc<dyn Storage> {
    Arc::new(JsonFileStorage::new(Path::new(&cfg.directory)))
}

/// Provider-backed step executor with the configured retry strategy.
pub fn build_step_executor(
    cfg: &EngineConfig,
    pool: WorkerPool,
    jobs: JobManager,
    log: &LogContext,
) -> Arc<dyn StepExecutor> {
    let providers = build_provider_registry(cfg);
    let inner = ProviderStepExecutor::new(providers, pool, log.clone()).with_job_logs(jobs);
    Arc::new(RetryingStepExecutor::new(
        Arc::new(inner),
        build_retry_strategy(&cfg.retry),
        log.clone(),
    ))
}
