//! Polling policy shared by both lifecycle waits

use crate::config::TrackerConfig;

use serde::Deserialize;
use std::time::Duration;

/// What the lock wait does once the contract has stayed locked past its budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LockWaitMode {
    /// Log an error once and keep polling until the lock is released
    #[default]
    Diagnostic,
    /// Fail the wait with `StillLockedTooLong`
    Strict,
}

/// Timing and retry budget for a lifecycle wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingPolicy {
    /// Delay between transaction status queries
    pub poll_interval: Duration,
    /// Consecutive NOT_STARTED observations that end the wait
    pub max_not_started_polls: u32,
    /// Delay between lock queries
    pub lock_poll_interval: Duration,
    /// Consecutive locked observations before the lock diagnostic fires
    pub max_wait_polls: u32,
    pub lock_wait_mode: LockWaitMode,
    /// Fail once the coordination height passes the transaction's timeout height
    pub enforce_timeout_height: bool,
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            // Coordination chain block period
            poll_interval: Duration::from_millis(2000),
            max_not_started_polls: 5,
            lock_poll_interval: Duration::from_millis(100),
            max_wait_polls: 10,
            lock_wait_mode: LockWaitMode::Diagnostic,
            enforce_timeout_height: false,
        }
    }
}

impl From<&TrackerConfig> for PollingPolicy {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_not_started_polls: config.max_not_started_polls,
            lock_poll_interval: Duration::from_millis(config.lock_poll_interval_ms),
            max_wait_polls: config.max_wait_polls,
            lock_wait_mode: config.lock_wait_mode,
            enforce_timeout_height: config.enforce_timeout_height,
        }
    }
}
