use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;

/// Step kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Delegated to the single-step executor.
    #[default]
    Task,
    /// Runs its nested steps through the parallel executor.
    Parallel,
    /// Runs its nested steps only when its condition holds.
    Conditional,
    /// Gathers the named outputs of its dependencies.
    DataCollection,
    /// Forwards its resolved inputs as outputs.
    PassThrough,
}

/// Condition of a conditional step.
///
/// `input` is a reference in the same `step_id.output` form as step inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCondition {
    pub input: String,
    #[serde(default)]
    pub equals: Option<serde_json::Value>,
}

/// Smallest orchestrated unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,

    #[serde(default)]
    pub kind: StepKind,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Timeout in seconds, enforced by the step executor.
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Extra attempts after the first failure.
    #[serde(default)]
    pub retry: Option<u32>,

    /// Nested steps for parallel and conditional kinds.
    #[serde(default)]
    pub steps: Vec<Step>,

    #[serde(default)]
    pub prompt: Option<String>,

    /// Overrides the job's provider for this step.
    #[serde(default)]
    pub provider: Option<ProviderKind>,

    /// input name -> `step_id.output` (or bare `step_id` for all outputs)
    #[serde(default)]
    pub inputs: HashMap<String, String>,

    /// Declared output names.
    #[serde(default)]
    pub outputs: Vec<String>,

    #[serde(default)]
    pub condition: Option<StepCondition>,
}

impl Step {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
            depends_on: Vec::new(),
            timeout: None,
            retry: None,
            steps: Vec::new(),
            prompt: None,
            provider: None,
            inputs: HashMap::new(),
            outputs: Vec::new(),
            condition: None,
        }
    }

    pub fn task(id: impl Into<String>) -> Self {
        Self::new(id, StepKind::Task)
    }

    pub fn parallel(id: impl Into<String>, steps: Vec<Step>) -> Self {
        let mut step = Self::new(id, StepKind::Parallel);
        step.steps = steps;
        step
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, reference: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), reference.into());
        self
    }
}

/// Common step interface for graph handling.
pub trait Schedulable: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn dependencies(&self) -> &[String];
}

impl Schedulable for Step {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.depends_on
    }
}

/// Steps eligible to run together at one depth of the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct StepGroup<T> {
    pub level: usize,
    pub steps: Vec<T>,
}

impl<T: Schedulable> StepGroup<T> {
    pub fn ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_step() {
        let step: Step = serde_json::from_str(r#"{"id": "lint"}"#).unwrap();
        assert_eq!(step.kind, StepKind::Task);
        assert!(step.depends_on.is_empty());
        assert!(step.timeout.is_none());
    }

    #[test]
    fn test_deserialize_nested_parallel() {
        let step: Step = serde_json::from_str(
            r#"{
                "id": "checks",
                "kind": "parallel",
                "depends_on": ["build"],
                "steps": [{"id": "unit"}, {"id": "e2e", "timeout": 600, "retry": 2}]
            }"#,
        )
        .unwrap();
        assert_eq!(step.kind, StepKind::Parallel);
        assert_eq!(step.steps.len(), 2);
        assert_eq!(step.steps[1].retry, Some(2));
        assert_eq!(step.dependencies(), ["build".to_string()]);
    }
}
