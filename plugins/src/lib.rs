//! Reference collaborators for `agentflow-core`: agent CLI processes, retry
//! strategies, provider-backed step execution and JSON file storage.

pub mod executor;
pub mod factory;
pub mod provider;
pub mod storage;
