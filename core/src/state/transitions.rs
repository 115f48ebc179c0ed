//! 状态转换规则和验证

use std::fmt;

use thiserror::Error;

use crate::jobs::JobStatus;
use crate::pool::WorkerStatus;

/// 状态转换错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid {entity} transition for '{id}': {from} -> {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub id: String,
    pub from: String,
    pub to: String,
}

/// A closed status enumeration with a fixed transition table.
pub trait Lifecycle: Copy + Eq + fmt::Debug + fmt::Display + 'static {
    /// Entity name used in error messages ("worker", "job").
    const ENTITY: &'static str;

    /// Statuses reachable from `self` in one step, excluding `self`.
    fn allowed_targets(self) -> &'static [Self];

    fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    fn can_transition_to(self, to: Self) -> bool {
        self == to || self.allowed_targets().contains(&to)
    }
}

impl Lifecycle for WorkerStatus {
    const ENTITY: &'static str = "worker";

    fn allowed_targets(self) -> &'static [Self] {
        use WorkerStatus::*;
        match self {
            Idle => &[Running, Busy, Stopped],
            Running => &[Idle, Error, Stopped],
            Busy => &[Idle, Error, Stopped],
            Error => &[Idle, Stopped],
            Stopped => &[],
        }
    }
}

impl Lifecycle for JobStatus {
    const ENTITY: &'static str = "job";

    fn allowed_targets(self) -> &'static [Self] {
        use JobStatus::*;
        match self {
            // A job that never got a worker may still be failed outright.
            Pending => &[Running, Failed, Cancelled],
            Running => &[Completed, Failed, Cancelled],
            Completed | Failed | Cancelled => &[],
        }
    }
}

/// 状态转换
pub struct StateTransition;

impl StateTransition {
    /// 验证状态转换是否合法
    pub fn validate<S: Lifecycle>(id: &str, from: S, to: S) -> Result<(), TransitionError> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransitionError {
                entity: S::ENTITY,
                id: id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// 判断是否为终态
    pub fn is_terminal<S: Lifecycle>(status: S) -> bool {
        status.is_terminal()
    }
}
