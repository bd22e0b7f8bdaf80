//! Error types for the cross-chain tracker

use thiserror::Error;

/// Main error type for tracking and sample orchestration
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Coordination setup missing: {0}")]
    ConfigurationMissing(String),

    #[error("Chain connection error for chain {chain_id}: {message}")]
    ChainConnection { chain_id: u64, message: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Crosschain transaction {tx} never started after {polls} polls")]
    NeverStarted { tx: String, polls: u32 },

    #[error("Crosschain transaction {tx} reported unknown state {code} (poll {polls})")]
    UnknownState { tx: String, code: u64, polls: u32 },

    #[error(
        "Crosschain transaction {tx} timed out: coordination height {current_height} passed timeout {timeout_height}"
    )]
    TimedOut {
        tx: String,
        timeout_height: u64,
        current_height: u64,
    },

    #[error("Contract {lock} still locked after {polls} polls")]
    StillLockedTooLong { lock: String, polls: u32 },

    #[error("Wait for {target} interrupted after {polls} polls")]
    Interrupted { target: String, polls: u32 },

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Properties error: {0}")]
    Properties(String),

    #[error("Property {key} missing from {file}")]
    PropertyMissing { key: String, file: String },

    #[error("Chain {name} not found")]
    ChainNotFound { name: String },

    #[error("Unexpected result: {0}")]
    Assertion(String),
}

impl TrackerError {
    /// Check if error came from the transport and may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::ChainConnection { .. } | TrackerError::Rpc(_)
        )
    }

    /// Check if error is a terminal verdict of a lifecycle wait
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            TrackerError::NeverStarted { .. }
                | TrackerError::UnknownState { .. }
                | TrackerError::TimedOut { .. }
                | TrackerError::StillLockedTooLong { .. }
                | TrackerError::Interrupted { .. }
        )
    }
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;
