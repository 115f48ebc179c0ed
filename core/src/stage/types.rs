use serde::{Deserialize, Serialize};

/// Evaluation handed to the loop after a check stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub done: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub reasons: Vec<String>,
    /// Recommended stage to continue with when not done.
    #[serde(default)]
    pub next_stage: Option<String>,
}

impl CheckResult {
    pub fn done(summary: impl Into<String>) -> Self {
        Self {
            done: true,
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn not_done(summary: impl Into<String>) -> Self {
        Self {
            done: false,
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    pub fn recommend(mut self, stage: impl Into<String>) -> Self {
        self.next_stage = Some(stage.into());
        self
    }
}

/// What the loop decided from a [`CheckResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDecision {
    pub done: bool,
    /// `None` when done.
    pub next_stage: Option<String>,
    pub reason: String,
}

/// Resumable loop state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageState {
    pub stage: String,
    pub iteration: u32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub last_decision: Option<StageDecision>,
}

/// Report from one stage run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageReport {
    /// The stage finished; continue with the next configured stage.
    Advanced,
    /// The stage produced an evaluation for the loop to decide on.
    Checked(CheckResult),
}

/// How a driven loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// Iteration ceiling reached without a done evaluation.
    Exhausted,
    Failed { stage: String, error: String },
}
