use std::time::Duration;

use super::super::limits;

/// 重试策略插件
///
/// `attempt` is 1-based: the attempt that just failed.
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn next_delay(&self, attempt: u32, error: &str) -> Option<Duration>;
    fn max_attempts(&self) -> u32;
    fn should_retry(&self, attempt: u32, error: &str) -> bool {
        attempt < self.max_attempts() && !self.is_fatal_error(error)
    }
    fn is_fatal_error(&self, _error: &str) -> bool {
        false
    }
    /// Attempts allowed for a step declaring `retry` extra attempts, capped
    /// by the strategy.
    fn attempts_for(&self, retry: Option<u32>) -> u32 {
        limits::max_attempts(retry).min(self.max_attempts().max(1))
    }
}
