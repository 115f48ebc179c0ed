#![cfg(unix)]

use std::collections::HashMap;
use std::sync::Arc;

use agentflow_core::config::{EngineConfig, ProviderCommand, StorageConfig};
use agentflow_core::executor::{RunStatus, Step};
use agentflow_core::jobs::{JobManager, JobStatus, NewJob};
use agentflow_core::orchestrator::{Orchestrator, StaticWorkflows};
use agentflow_core::pool::{WorkerPool, WorkerStatus};
use agentflow_core::provider::ProviderKind;
use agentflow_core::LogContext;
use agentflow_plugins::factory::{build_step_executor, build_storage};
use pretty_assertions::assert_eq;
use serde_json::json;

/// Agent stand-in: echoes the prompt back as `{"summary": "<prompt>"}`.
fn echo_agent() -> ProviderCommand {
    ProviderCommand {
        command: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            r#"echo "thinking"; printf '{"summary":"%s"}\n' "$1""#.to_string(),
            "agent".to_string(),
        ],
        envs: HashMap::new(),
    }
}

#[tokio::test]
async fn job_runs_through_process_provider_and_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = EngineConfig::default();
    cfg.providers.claude = echo_agent();
    cfg.storage = StorageConfig {
        directory: dir.path().display().to_string(),
    };

    let log = LogContext::disabled();
    let pool = WorkerPool::new(cfg.pool.max_workers, log.clone());
    let jobs = JobManager::new(log.clone());
    let storage = build_storage(&cfg.storage);

    let workflows = StaticWorkflows::new().with(
        "feature",
        vec![
            Step::task("plan").with_prompt("plan {{goal}}"),
            Step::task("code")
                .depends_on(["plan"])
                .with_input("plan", "plan.summary")
                .with_prompt("code after {{plan}}"),
        ],
    );

    let orch = Orchestrator::new(
        pool.clone(),
        jobs.clone(),
        build_step_executor(&cfg, pool.clone(), jobs.clone(), &log),
        Arc::new(workflows),
        log.clone(),
    )
    .with_storage(storage.clone());

    let id = orch.submit(
        NewJob::new("feature", dir.path(), ProviderKind::Claude).variable("goal", "caching"),
    );
    let run = orch.dispatch_next().await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Completed, "{:?}", run.error);
    assert_eq!(
        run.result("code").unwrap().outputs["summary"],
        json!("code after plan caching")
    );
    assert_eq!(jobs.get(&id).unwrap().status, JobStatus::Completed);
    assert_eq!(pool.list()[0].status, WorkerStatus::Idle);

    let saved = storage.load_jobs().await.unwrap();
    assert_eq!(saved[0].status, JobStatus::Completed);
    assert!(dir.path().join("workers.json").exists());
}
