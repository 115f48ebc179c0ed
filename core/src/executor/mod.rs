//! Step graph execution
//!
//! This module turns a job's step list into a run:
//! - Dependency graph construction and validation (duplicates, missing
//!   references, cycles)
//! - Leveling into groups that may run together
//! - Level-by-level execution with worker-capacity batching for parallel steps
//! - Named outputs fed forward between steps through [`StepContext`]
//!
//! # Architecture
//!
//! ```text
//! Vec<Step>
//!   ↓
//! StepGraph::from_steps()
//!   ↓
//! StepGraph::validate() → missing deps, then cycle detection
//!   ↓
//! StepGraph::resolve_order() → Vec<StepGroup<Step>> (levels)
//!   ↓
//! WorkflowEngine::run() → per level: StepExecutor / ParallelStepExecutor
//!   ↓
//! WorkflowRun
//! ```

mod context;
mod engine;
mod graph;
pub mod limits;
mod parallel;
pub mod traits;
pub mod types;

pub use context::StepContext;
pub use engine::WorkflowEngine;
pub use graph::{resolve_order, validate, StepGraph};
pub use parallel::ParallelStepExecutor;
pub use traits::{RetryStrategyPlugin, StepExecutor};
pub use types::{
    RunStatus, Schedulable, Step, StepCondition, StepGroup, StepKind, StepResult, StepStatus,
    WorkflowRun,
};
