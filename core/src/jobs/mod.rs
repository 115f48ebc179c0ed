//! Job ("order") records and their lifecycle.

pub mod manager;
pub mod types;

pub use manager::JobManager;
pub use types::{Job, JobStatus, NewJob};
