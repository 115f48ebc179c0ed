use std::time::Duration;

use agentflow_core::config::RetryConfig;
use agentflow_core::executor::RetryStrategyPlugin;

/// Failures that retrying cannot fix.
const PERMANENT_MARKERS: &[&str] = &[
    "nested parallel not supported",
    "No such file or directory",
    "command not found",
];

fn is_permanent(error: &str) -> bool {
    PERMANENT_MARKERS.iter().any(|m| error.contains(m))
}

/// Delay doubles after every failed attempt: base, 2·base, 4·base, … capped.
pub struct ExponentialBackoffPlugin {
    config: RetryConfig,
}

/// Delay grows by `base` after every failed attempt, capped.
pub struct LinearRetryPlugin {
    config: RetryConfig,
}

impl ExponentialBackoffPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl LinearRetryPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl RetryStrategyPlugin for ExponentialBackoffPlugin {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        if attempt == 0 || attempt >= self.config.max_attempts {
            return None;
        }
        let exp = 1u64 << (attempt - 1).min(30);
        let delay = self
            .config
            .base_delay_ms
            .saturating_mul(exp)
            .min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    fn is_fatal_error(&self, error: &str) -> bool {
        is_permanent(error)
    }
}

impl RetryStrategyPlugin for LinearRetryPlugin {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        if attempt == 0 || attempt >= self.config.max_attempts {
            return None;
        }
        let delay = self
            .config
            .base_delay_ms
            .saturating_mul(u64::from(attempt))
            .min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    fn is_fatal_error(&self, error: &str) -> bool {
        is_permanent(error)
    }
}
