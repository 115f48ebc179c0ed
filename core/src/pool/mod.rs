//! Bounded pool of execution slots bound to provider kinds.

pub mod manager;
pub mod types;

pub use manager::WorkerPool;
pub use types::{Worker, WorkerStatus};
