//! Cross-chain transaction lifecycle tracking
//!
//! Polls a crosschain coordination contract until a transaction commits or is
//! ignored, and waits for contracts locked by an in-flight crosschain call to
//! be released. Around that core sit the pieces the sample flows need:
//! chain providers, coordination discovery, contract deployment and a small
//! persisted property store.

pub mod chain;
pub mod config;
pub mod coordination;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod properties;
pub mod samples;
pub mod tracker;
pub mod tx;

pub use error::{TrackerError, TrackerResult};
pub use tracker::{
    LifecycleTracker, PollingPolicy, RemoteStatusSource, TerminalOutcome, TrackedLock,
    TrackedTransaction, Unlocked,
};
