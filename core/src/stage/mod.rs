//! Iterative stage loop (plan → code → test → check) with an iteration
//! ceiling, plus a driver that runs it against a [`StageRunner`].

mod driver;
mod fsm;
mod types;

pub use driver::{StageDriver, StageRunner};
pub use fsm::StageLoop;
pub use types::{CheckResult, StageDecision, StageOutcome, StageReport, StageState};
