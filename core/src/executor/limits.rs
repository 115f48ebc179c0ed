//! Per-step timeout and attempt limits shared by step executors.

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const MAX_TIMEOUT_SECS: u64 = 60 * 60;

pub fn effective_timeout_secs(timeout: Option<u64>) -> u64 {
    let v = timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
    v.clamp(1, MAX_TIMEOUT_SECS)
}

pub fn max_attempts(retry: Option<u32>) -> u32 {
    retry.unwrap_or(0).saturating_add(1).max(1)
}
