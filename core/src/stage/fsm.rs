use crate::config::StageLoopConfig;
use crate::error::StageError;
use crate::logging::LogContext;

use super::types::{CheckResult, StageDecision, StageState};

/// Bounded loop over an ordered list of named stages.
///
/// Moving to the immediate successor is forward progress. Any other move,
/// including a move to the current stage, counts as one iteration.
#[derive(Debug, Clone)]
pub struct StageLoop {
    stages: Vec<String>,
    max_iterations: u32,
    fallback_stage: String,
    state: StageState,
    log: LogContext,
}

impl StageLoop {
    pub fn new(config: StageLoopConfig, log: LogContext) -> Result<Self, StageError> {
        let Some(first) = config.stages.first().cloned() else {
            return Err(StageError::EmptyStageList);
        };
        if !config.stages.contains(&config.fallback_stage) {
            return Err(StageError::UnknownStage(config.fallback_stage));
        }

        Ok(Self {
            stages: config.stages,
            max_iterations: config.max_iterations,
            fallback_stage: config.fallback_stage,
            state: StageState {
                stage: first,
                iteration: 0,
                error: None,
                last_decision: None,
            },
            log: log.child("stage_loop"),
        })
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn current_stage(&self) -> &str {
        &self.state.stage
    }

    pub fn iteration(&self) -> u32 {
        self.state.iteration
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    fn position(&self, stage: &str) -> Option<usize> {
        self.stages.iter().position(|s| s == stage)
    }

    fn current_position(&self) -> Result<usize, StageError> {
        self.position(&self.state.stage)
            .ok_or_else(|| StageError::UnknownStage(self.state.stage.clone()))
    }

    /// Advance to the next configured stage without counting an iteration.
    pub fn transition_to_next(&mut self) -> Result<&str, StageError> {
        let pos = self.current_position()?;
        let Some(next) = self.stages.get(pos + 1).cloned() else {
            return Err(StageError::EndOfStages(self.state.stage.clone()));
        };

        tracing::debug!(parent: self.log.span(), from = %self.state.stage, to = %next, "stage advanced");
        self.state.stage = next;
        Ok(self.state.stage.as_str())
    }

    pub fn transition_to(&mut self, target: &str) -> Result<(), StageError> {
        let target_pos = self
            .position(target)
            .ok_or_else(|| StageError::UnknownStage(target.to_string()))?;
        let pos = self.current_position()?;

        if target_pos != pos + 1 {
            self.state.iteration += 1;
            tracing::info!(
                parent: self.log.span(),
                from = %self.state.stage,
                to = %target,
                iteration = self.state.iteration,
                "stage loop back"
            );
        }
        self.state.stage = target.to_string();
        Ok(())
    }

    pub fn can_continue(&self) -> bool {
        self.state.iteration < self.max_iterations
    }

    /// Decide what follows a check.
    ///
    /// A recommended stage that is not configured is replaced by the
    /// fallback stage.
    pub fn evaluate_check_result(&mut self, result: &CheckResult) -> StageDecision {
        let reason = describe(result);

        let decision = if result.done {
            StageDecision {
                done: true,
                next_stage: None,
                reason,
            }
        } else {
            let next = match result.next_stage.as_deref() {
                Some(stage) if self.position(stage).is_some() => stage.to_string(),
                Some(stage) => {
                    tracing::warn!(parent: self.log.span(), recommended = %stage, fallback = %self.fallback_stage, "unknown recommended stage");
                    self.fallback_stage.clone()
                }
                None => self.fallback_stage.clone(),
            };
            StageDecision {
                done: false,
                next_stage: Some(next),
                reason,
            }
        };

        self.state.last_decision = Some(decision.clone());
        decision
    }

    pub fn state(&self) -> StageState {
        self.state.clone()
    }

    pub fn restore_state(&mut self, state: StageState) -> Result<(), StageError> {
        if self.position(&state.stage).is_none() {
            return Err(StageError::UnknownStage(state.stage));
        }
        self.state = state;
        Ok(())
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.state.error = error;
    }
}

fn describe(result: &CheckResult) -> String {
    match (result.summary.is_empty(), result.reasons.is_empty()) {
        (_, true) => result.summary.clone(),
        (true, false) => result.reasons.join("; "),
        (false, false) => format!("{}: {}", result.summary, result.reasons.join("; ")),
    }
}
