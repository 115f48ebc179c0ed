//! Provider abstraction over external AI command-line agents.
//!
//! The core only consumes this contract; concrete process adapters live in
//! `agentflow-plugins`.

pub mod registry;
pub mod traits;
pub mod types;

pub use registry::ProviderRegistry;
pub use traits::{Provider, ProviderSession};
pub use types::{ProviderExit, ProviderKind, ProviderStartArgs};
