//! Pure lifecycle state machines
//!
//! Each watch consumes one observation and returns its next state together with
//! the action the scheduler must take. Nothing here sleeps or talks to a node.

use super::policy::{LockWaitMode, PollingPolicy};

use std::fmt;

/// Status codes reported by the coordination contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    NotStarted,
    Started,
    Committed,
    Ignored,
    Unknown(u64),
}

impl TransactionStatus {
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => TransactionStatus::NotStarted,
            1 => TransactionStatus::Started,
            2 => TransactionStatus::Committed,
            3 => TransactionStatus::Ignored,
            other => TransactionStatus::Unknown(other),
        }
    }

}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::NotStarted => write!(f, "NOT STARTED"),
            TransactionStatus::Started => write!(f, "STARTED"),
            TransactionStatus::Committed => write!(f, "COMMITTED"),
            TransactionStatus::Ignored => write!(f, "IGNORED"),
            TransactionStatus::Unknown(code) => write!(f, "UNKNOWN: {}", code),
        }
    }
}

/// Final verdict of the coordination contract's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    Committed,
    /// The vote rejected the transaction. Not an error.
    Ignored,
}

impl TerminalOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TerminalOutcome::Committed)
    }
}

impl fmt::Display for TerminalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalOutcome::Committed => write!(f, "COMMITTED"),
            TerminalOutcome::Ignored => write!(f, "IGNORED"),
        }
    }
}

/// Lock released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unlocked {
    /// Number of lock queries it took
    pub polls: u32,
}

/// Reason a transaction watch stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFailure {
    NeverStarted,
    UnknownState(u64),
    TimedOut {
        timeout_height: u64,
        current_height: u64,
    },
}

/// What the scheduler does after a transaction status observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionAction {
    /// Sleep one interval, then poll again
    Poll,
    Finish(TerminalOutcome),
    Fail(TransactionFailure),
}

/// What the scheduler does after a lock observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    /// Sleep one interval, then poll again
    Poll,
    /// Still locked past the wait budget: complain once, keep polling
    Diagnose,
    Finish(Unlocked),
    /// Still locked past the wait budget in strict mode
    GiveUp,
}

/// Transaction status watch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionWatch {
    pub timeout_height: u64,
    pub polls: u32,
    pub not_started: u32,
    pub last_status: Option<TransactionStatus>,
    pub last_height: Option<u64>,
}

impl TransactionWatch {
    pub fn new(timeout_height: u64) -> Self {
        Self {
            timeout_height,
            polls: 0,
            not_started: 0,
            last_status: None,
            last_height: None,
        }
    }

    pub fn observe(
        mut self,
        code: u64,
        current_height: u64,
        policy: &PollingPolicy,
    ) -> (Self, TransactionAction) {
        let status = TransactionStatus::from_code(code);
        self.polls += 1;
        self.last_status = Some(status);
        self.last_height = Some(current_height);

        let action = match status {
            TransactionStatus::Committed => TransactionAction::Finish(TerminalOutcome::Committed),
            TransactionStatus::Ignored => TransactionAction::Finish(TerminalOutcome::Ignored),
            TransactionStatus::Unknown(code) => {
                TransactionAction::Fail(TransactionFailure::UnknownState(code))
            }
            TransactionStatus::NotStarted => {
                self.not_started += 1;
                if self.not_started >= policy.max_not_started_polls {
                    TransactionAction::Fail(TransactionFailure::NeverStarted)
                } else {
                    self.check_timeout(current_height, policy)
                }
            }
            TransactionStatus::Started => {
                self.not_started = 0;
                self.check_timeout(current_height, policy)
            }
        };

        (self, action)
    }

    fn check_timeout(&self, current_height: u64, policy: &PollingPolicy) -> TransactionAction {
        if policy.enforce_timeout_height && current_height > self.timeout_height {
            TransactionAction::Fail(TransactionFailure::TimedOut {
                timeout_height: self.timeout_height,
                current_height,
            })
        } else {
            TransactionAction::Poll
        }
    }
}

/// Contract lock watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockWatch {
    pub polls: u32,
    pub locked_polls: u32,
    pub diagnostic_emitted: bool,
}

impl LockWatch {
    pub fn observe(mut self, locked: bool, policy: &PollingPolicy) -> (Self, LockAction) {
        self.polls += 1;
        if !locked {
            return (self, LockAction::Finish(Unlocked { polls: self.polls }));
        }

        self.locked_polls += 1;
        if self.locked_polls <= policy.max_wait_polls {
            return (self, LockAction::Poll);
        }

        let action = match policy.lock_wait_mode {
            LockWaitMode::Strict => LockAction::GiveUp,
            LockWaitMode::Diagnostic if !self.diagnostic_emitted => {
                self.diagnostic_emitted = true;
                LockAction::Diagnose
            }
            LockWaitMode::Diagnostic => LockAction::Poll,
        };
        (self, action)
    }
}
