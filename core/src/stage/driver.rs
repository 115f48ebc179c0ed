use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StageError;
use crate::logging::LogContext;
use crate::storage::Storage;

use super::fsm::StageLoop;
use super::types::{StageOutcome, StageReport, StageState};

/// Runs the work of one named stage.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run_stage(&self, stage: &str, state: &StageState) -> anyhow::Result<StageReport>;
}

/// Drives a [`StageLoop`] with a [`StageRunner`], checkpointing after every
/// transition when storage is attached.
pub struct StageDriver {
    fsm: StageLoop,
    runner: Arc<dyn StageRunner>,
    checkpoint: Option<(Arc<dyn Storage>, String)>,
    log: LogContext,
}

impl StageDriver {
    pub fn new(fsm: StageLoop, runner: Arc<dyn StageRunner>, log: LogContext) -> Self {
        Self {
            fsm,
            runner,
            checkpoint: None,
            log: log.child("stage_driver"),
        }
    }

    /// Save the loop state under `key` after each transition.
    pub fn with_checkpoints(mut self, storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        self.checkpoint = Some((storage, key.into()));
        self
    }

    pub fn state(&self) -> StageState {
        self.fsm.state()
    }

    pub fn stage_loop(&self) -> &StageLoop {
        &self.fsm
    }

    /// Restore the last checkpoint. Returns `false` when none was saved.
    pub async fn resume(&mut self) -> Result<bool, StageError> {
        let Some((storage, key)) = self.checkpoint.as_ref() else {
            return Ok(false);
        };
        let saved = storage
            .load_stage_state(key)
            .await
            .map_err(|e| StageError::Checkpoint(e.to_string()))?;

        match saved {
            Some(state) => {
                tracing::info!(parent: self.log.span(), key = %key, stage = %state.stage, iteration = state.iteration, "resuming stage loop");
                self.fsm.restore_state(state)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save(&self) -> Result<(), StageError> {
        if let Some((storage, key)) = self.checkpoint.as_ref() {
            storage
                .save_stage_state(key, &self.fsm.state())
                .await
                .map_err(|e| StageError::Checkpoint(e.to_string()))?;
        }
        Ok(())
    }

    /// Run stages until a check reports done, the iteration ceiling is
    /// reached, or a stage fails.
    ///
    /// A stage that advances past the last configured stage completes the
    /// loop. A restored state already at the ceiling is reported as
    /// exhausted without running any stage.
    pub async fn run(&mut self) -> Result<StageOutcome, StageError> {
        if !self.fsm.can_continue() {
            tracing::warn!(parent: self.log.span(), iteration = self.fsm.iteration(), "stage loop already exhausted");
            return Ok(StageOutcome::Exhausted);
        }

        loop {
            let stage = self.fsm.current_stage().to_string();
            tracing::info!(parent: self.log.span(), %stage, iteration = self.fsm.iteration(), "stage started");

            let report = match self.runner.run_stage(&stage, &self.fsm.state()).await {
                Ok(report) => report,
                Err(e) => {
                    let error = format!("{e:#}");
                    tracing::error!(parent: self.log.span(), %stage, %error, "stage failed");
                    self.fsm.set_error(Some(error.clone()));
                    self.save().await?;
                    return Ok(StageOutcome::Failed { stage, error });
                }
            };
            self.fsm.set_error(None);

            match report {
                StageReport::Advanced => match self.fsm.transition_to_next() {
                    Ok(_) => {}
                    Err(StageError::EndOfStages(_)) => {
                        self.save().await?;
                        return Ok(StageOutcome::Completed);
                    }
                    Err(e) => return Err(e),
                },
                StageReport::Checked(result) => {
                    let decision = self.fsm.evaluate_check_result(&result);
                    if decision.done {
                        tracing::info!(parent: self.log.span(), reason = %decision.reason, "stage loop completed");
                        self.save().await?;
                        return Ok(StageOutcome::Completed);
                    }

                    let next = decision
                        .next_stage
                        .unwrap_or_else(|| self.fsm.current_stage().to_string());
                    self.fsm.transition_to(&next)?;

                    if !self.fsm.can_continue() {
                        tracing::warn!(
                            parent: self.log.span(),
                            iteration = self.fsm.iteration(),
                            reason = %decision.reason,
                            "stage loop exhausted"
                        );
                        self.save().await?;
                        return Ok(StageOutcome::Exhausted);
                    }
                }
            }

            self.save().await?;
        }
    }
}

impl std::fmt::Debug for StageDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDriver")
            .field("state", &self.fsm.state())
            .field("checkpoint", &self.checkpoint.as_ref().map(|(_, key)| key))
            .finish()
    }
}
