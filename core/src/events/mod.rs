//! Lifecycle notifications published by the worker pool and the job manager.
//!
//! Each manager owns its own [`ObserverRegistry`]; delivery is synchronous on
//! the emitting call and there is no replay for late subscribers.

pub mod registry;
pub mod types;

pub use registry::{Observer, ObserverRegistry, Subscription};
pub use types::{JobEvent, WorkerEvent};
