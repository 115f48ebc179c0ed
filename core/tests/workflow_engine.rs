mod common;

use std::sync::Arc;

use agentflow_core::executor::{
    RunStatus, Step, StepCondition, StepKind, StepStatus, WorkflowEngine,
};
use agentflow_core::jobs::{JobManager, JobStatus};
use agentflow_core::LogContext;
use common::{job, pool_with_idle, task, ScriptedExecutor};
use pretty_assertions::assert_eq;
use serde_json::json;

fn engine(exec: Arc<ScriptedExecutor>) -> WorkflowEngine {
    WorkflowEngine::new(pool_with_idle(2, 4), exec, LogContext::disabled())
}

fn position(executed: &[String], id: &str) -> usize {
    executed.iter().position(|s| s == id).unwrap()
}

#[tokio::test]
async fn levels_run_in_dependency_order() {
    let exec = Arc::new(ScriptedExecutor::new().with_delay(2));
    let jobs = JobManager::new(LogContext::disabled());
    let steps = vec![
        task("A", &[]),
        task("B", &[]),
        task("C", &["A"]),
        task("D", &["B"]),
        task("E", &["C", "D"]),
    ];

    let run = engine(exec.clone()).run(&job(&jobs, "dag"), &steps).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.error, None);
    assert_eq!(run.step_results.len(), 5);

    let executed = exec.executed();
    for (dep, dependent) in [("A", "C"), ("B", "D"), ("C", "E"), ("D", "E")] {
        assert!(position(&executed, dep) < position(&executed, dependent));
    }
    assert!(position(&executed, "B") < position(&executed, "C"));
}

#[tokio::test]
async fn invalid_graph_fails_without_running_anything() {
    let exec = Arc::new(ScriptedExecutor::new());
    let jobs = JobManager::new(LogContext::disabled());
    let steps = vec![task("a", &["b"]), task("b", &["a"])];

    let run = engine(exec.clone()).run(&job(&jobs, "cyclic"), &steps).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.step_results.is_empty());
    assert!(run.error.unwrap().to_lowercase().contains("circular"));
    assert!(exec.executed().is_empty());
}

#[tokio::test]
async fn failure_halts_later_levels_and_keeps_results() {
    let exec = Arc::new(ScriptedExecutor::new().failing("build"));
    let jobs = JobManager::new(LogContext::disabled());
    let steps = vec![
        task("fmt", &[]),
        task("build", &[]),
        task("test", &["build"]),
    ];

    let run = engine(exec.clone()).run(&job(&jobs, "ci"), &steps).await;

    assert_eq!(run.status, RunStatus::Failed);
    let error = run.error.clone().unwrap();
    assert!(error.starts_with("one or more steps failed"), "{error}");
    assert!(error.contains("build"), "{error}");
    assert_eq!(run.step_results.len(), 2);
    assert!(run.result("fmt").unwrap().is_success());
    assert_eq!(run.failed_steps(), vec!["build"]);
    assert!(!exec.executed().contains(&"test".to_string()));
}

#[tokio::test]
async fn executor_error_becomes_failed_result() {
    let exec = Arc::new(ScriptedExecutor::new().raising("deploy"));
    let jobs = JobManager::new(LogContext::disabled());

    let run = engine(exec).run(&job(&jobs, "ship"), &[task("deploy", &[])]).await;

    assert_eq!(run.status, RunStatus::Failed);
    let result = run.result("deploy").unwrap();
    assert_eq!(result.status, StepStatus::Failed);
    assert!(result.error.as_deref().unwrap().contains("could not start"));
}

#[tokio::test]
async fn cancellation_stops_at_next_level() {
    let jobs = JobManager::new(LogContext::disabled());
    let job = job(&jobs, "long");
    jobs.start(&job.id).unwrap();

    let cancel_jobs = jobs.clone();
    let job_id = job.id.clone();
    let exec = Arc::new(ScriptedExecutor::new().on_execute(move |step_id| {
        if step_id == "first" {
            cancel_jobs.cancel(&job_id).unwrap();
        }
    }));

    let engine = engine(exec.clone()).with_jobs(jobs.clone());
    let steps = vec![task("first", &[]), task("second", &["first"])];
    let run = engine.run(&job, &steps).await;

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.step_results.len(), 1);
    assert_eq!(exec.executed(), vec!["first"]);
    assert_eq!(jobs.get(&job.id).unwrap().status, JobStatus::Cancelled);
}

#[tokio::test]
async fn parallel_step_runs_nested_steps() {
    let exec = Arc::new(ScriptedExecutor::new());
    let jobs = JobManager::new(LogContext::disabled());
    let steps = vec![
        task("checkout", &[]),
        Step::parallel(
            "checks",
            vec![task("lint", &[]), task("unit", &[]), task("docs", &[])],
        )
        .depends_on(["checkout"]),
    ];

    let run = engine(exec.clone()).run(&job(&jobs, "fan"), &steps).await;

    assert_eq!(run.status, RunStatus::Completed);
    let checks = run.result("checks").unwrap();
    assert_eq!(checks.output.as_deref(), Some("executed 3 steps"));
    assert_eq!(checks.outputs["unit"], json!({"result": "unit done"}));
    assert_eq!(exec.executed().len(), 4);
}

#[tokio::test]
async fn parallel_group_handles_engine_kinds_itself() {
    let exec = Arc::new(ScriptedExecutor::new());
    let jobs = JobManager::new(LogContext::disabled());
    let steps = vec![
        task("plan", &[]),
        Step::parallel(
            "fan",
            vec![
                task("a", &[]),
                Step::new("fwd", StepKind::PassThrough).with_input("plan", "plan.result"),
                Step::new("gather", StepKind::DataCollection).depends_on(["plan"]),
            ],
        )
        .depends_on(["plan"]),
    ];

    let run = engine(exec.clone()).run(&job(&jobs, "mixed"), &steps).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(exec.executed(), vec!["plan", "a"]);
    let fan = run.result("fan").unwrap();
    assert_eq!(fan.outputs["fwd"], json!({"plan": "plan done"}));
    assert_eq!(fan.outputs["gather"]["plan"], json!({"result": "plan done"}));
}

#[tokio::test]
async fn outputs_flow_into_later_steps() {
    let exec = Arc::new(ScriptedExecutor::new());
    let jobs = JobManager::new(LogContext::disabled());

    let forward = Step::new("forward", StepKind::PassThrough)
        .depends_on(["plan"])
        .with_input("plan_text", "plan.result");
    let gather = Step::new("gather", StepKind::DataCollection).depends_on(["plan", "forward"]);
    let code = task("code", &["forward"])
        .with_prompt("Implement: {{plan_text}}")
        .with_input("plan_text", "forward.plan_text");

    let steps = vec![task("plan", &[]), forward, gather, code];
    let run = engine(exec.clone()).run(&job(&jobs, "flow"), &steps).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        run.result("forward").unwrap().outputs["plan_text"],
        json!("plan done")
    );
    assert_eq!(
        run.result("gather").unwrap().outputs["plan"],
        json!({"result": "plan done"})
    );
    assert_eq!(exec.prompt_of("code").as_deref(), Some("Implement: plan done"));
}

#[tokio::test]
async fn conditional_runs_or_skips_nested_steps() {
    let exec = Arc::new(ScriptedExecutor::new());
    let jobs = JobManager::new(LogContext::disabled());

    let mut on_pass = Step::new("on_pass", StepKind::Conditional).depends_on(["check"]);
    on_pass.condition = Some(StepCondition {
        input: "check.result".to_string(),
        equals: Some(json!("check done")),
    });
    on_pass.steps = vec![task("publish", &[]), task("notify", &[])];

    let mut on_fail = Step::new("on_fail", StepKind::Conditional).depends_on(["check"]);
    on_fail.condition = Some(StepCondition {
        input: "check.verdict".to_string(),
        equals: None,
    });
    on_fail.steps = vec![task("rollback", &[])];

    let steps = vec![task("check", &[]), on_pass, on_fail];
    let run = engine(exec.clone()).run(&job(&jobs, "gate"), &steps).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.result("on_pass").unwrap().is_success());
    assert_eq!(run.result("on_fail").unwrap().status, StepStatus::Skipped);

    let executed = exec.executed();
    assert!(position(&executed, "publish") < position(&executed, "notify"));
    assert!(!executed.contains(&"rollback".to_string()));
}

#[tokio::test]
async fn steps_deserialize_from_json() {
    let steps: Vec<Step> = serde_json::from_value(json!([
        {"id": "plan", "prompt": "Plan {{goal}}"},
        {"id": "fan", "kind": "parallel", "depends_on": ["plan"], "steps": [
            {"id": "a"}, {"id": "b", "timeout": 30}
        ]}
    ]))
    .unwrap();

    assert_eq!(steps[0].kind, StepKind::Task);
    assert_eq!(steps[1].kind, StepKind::Parallel);
    assert_eq!(steps[1].steps[1].timeout, Some(30));

    let exec = Arc::new(ScriptedExecutor::new());
    let jobs = JobManager::new(LogContext::disabled());
    let job = jobs.create(
        agentflow_core::jobs::NewJob::new("json", "/tmp", agentflow_core::provider::ProviderKind::Claude)
            .variable("goal", "caching"),
    );
    let run = engine(exec.clone()).run(&job, &steps).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(exec.prompt_of("plan").as_deref(), Some("Plan caching"));
}
