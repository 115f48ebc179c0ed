//! Job dispatch: ties the worker pool, job manager, workflow engine and
//! storage together.

mod orchestrator;
mod source;

pub use orchestrator::Orchestrator;
pub use source::{StaticWorkflows, WorkflowSource};
