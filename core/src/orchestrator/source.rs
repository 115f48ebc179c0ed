use std::collections::HashMap;

use async_trait::async_trait;

use crate::executor::Step;

/// Maps a workflow id to its already-parsed steps.
#[async_trait]
pub trait WorkflowSource: Send + Sync {
    async fn load(&self, workflow: &str) -> anyhow::Result<Vec<Step>>;
}

/// Fixed in-memory workflow table.
#[derive(Debug, Clone, Default)]
pub struct StaticWorkflows {
    workflows: HashMap<String, Vec<Step>>,
}

impl StaticWorkflows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, workflow: impl Into<String>, steps: Vec<Step>) -> Self {
        self.insert(workflow, steps);
        self
    }

    pub fn insert(&mut self, workflow: impl Into<String>, steps: Vec<Step>) {
        self.workflows.insert(workflow.into(), steps);
    }
}

#[async_trait]
impl WorkflowSource for StaticWorkflows {
    async fn load(&self, workflow: &str) -> anyhow::Result<Vec<Step>> {
        self.workflows
            .get(workflow)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown workflow: {workflow}"))
    }
}
