pub mod provider_step;
pub mod retrying;
pub mod strategies;

pub use provider_step::ProviderStepExecutor;
pub use retrying::RetryingStepExecutor;
pub use strategies::{ExponentialBackoffPlugin, LinearRetryPlugin};
