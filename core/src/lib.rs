//! agentflow core: workflow execution engine for AI command-line agents.
//!
//! - [`executor`]: step graph resolution and level-by-level execution
//! - [`pool`]: bounded worker pool with lifecycle state machine
//! - [`jobs`]: job records, pending queue and lifecycle
//! - [`stage`]: iterative plan → code → test → check loop
//! - [`orchestrator`]: ties the above together for queued jobs
//!
//! Process adapters, retry strategies and file storage live in
//! `agentflow-plugins`.

pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod jobs;
pub mod logging;
pub mod orchestrator;
pub mod pool;
pub mod provider;
pub mod stage;
pub mod state;
pub mod storage;

pub use error::{EngineError, ErrorKind};
pub use logging::LogContext;
