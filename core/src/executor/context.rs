//! Per-run step context: job parameters plus the named outputs of finished steps.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::executor::types::{Step, StepResult};
use crate::jobs::Job;
use crate::provider::ProviderKind;

#[derive(Debug, Clone)]
pub struct StepContext {
    pub job_id: String,
    pub workdir: PathBuf,
    /// Job-level provider; a step may override it.
    pub provider: ProviderKind,
    pub variables: HashMap<String, String>,
    /// step_id -> output name -> value
    outputs: HashMap<String, HashMap<String, Value>>,
}

impl StepContext {
    pub fn new(job_id: impl Into<String>, workdir: impl Into<PathBuf>, provider: ProviderKind) -> Self {
        Self {
            job_id: job_id.into(),
            workdir: workdir.into(),
            provider,
            variables: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            workdir: job.target_dir.clone(),
            provider: job.provider,
            variables: job.variables.clone(),
            outputs: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn provider_for(&self, step: &Step) -> ProviderKind {
        step.provider.unwrap_or(self.provider)
    }

    /// Named outputs recorded for `step_id`, if it has finished.
    pub fn outputs_of(&self, step_id: &str) -> Option<&HashMap<String, Value>> {
        self.outputs.get(step_id)
    }

    /// Store the named outputs of a finished step. Failed results are ignored.
    pub fn record(&mut self, result: &StepResult) {
        if result.is_failed() {
            return;
        }
        self.outputs
            .insert(result.step_id.clone(), result.outputs.clone());
    }

    /// Look up one reference.
    ///
    /// `step_id` yields the whole output map of that step as an object,
    /// `step_id.name` a single output. Anything unknown is `null`.
    pub fn lookup(&self, reference: &str) -> Value {
        let reference = reference.trim();
        if let Some(all) = self.outputs.get(reference) {
            return Value::Object(all.clone().into_iter().collect());
        }
        reference
            .split_once('.')
            .and_then(|(step_id, name)| self.outputs.get(step_id)?.get(name).cloned())
            .unwrap_or(Value::Null)
    }

    pub fn resolve_inputs(&self, step: &Step) -> HashMap<String, Value> {
        step.inputs
            .iter()
            .map(|(name, reference)| (name.clone(), self.lookup(reference)))
            .collect()
    }

    /// Fill `{{name}}` placeholders in the step prompt.
    ///
    /// Resolved inputs win over job variables. Unknown placeholders are left
    /// as written.
    pub fn render_prompt(&self, step: &Step) -> Option<String> {
        let template = step.prompt.as_deref()?;
        let inputs = self.resolve_inputs(step);

        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find("{{") {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let Some(close) = after.find("}}") else {
                rendered.push_str(&rest[open..]);
                rest = "";
                break;
            };
            let key = after[..close].trim();
            match self.placeholder_value(key, &inputs) {
                Some(value) => rendered.push_str(&value),
                None => rendered.push_str(&rest[open..open + 2 + close + 2]),
            }
            rest = &after[close + 2..];
        }
        rendered.push_str(rest);

        Some(rendered)
    }

    fn placeholder_value(&self, key: &str, inputs: &HashMap<String, Value>) -> Option<String> {
        match inputs.get(key) {
            Some(Value::Null) | None => self.variables.get(key).cloned(),
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}
