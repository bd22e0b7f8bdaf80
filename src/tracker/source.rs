//! Remote status source abstraction

use crate::error::TrackerResult;

use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::fmt;

/// Raw status code reported by the coordination contract
pub type StatusCode = u64;

/// Block number on the coordination chain
pub type Height = u64;

/// A cross-chain transaction as known to the coordination contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackedTransaction {
    pub originating_chain_id: u64,
    pub transaction_id: U256,
}

impl TrackedTransaction {
    pub fn new(originating_chain_id: u64, transaction_id: U256) -> Self {
        Self {
            originating_chain_id,
            transaction_id,
        }
    }
}

impl fmt::Display for TrackedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.originating_chain_id, self.transaction_id)
    }
}

/// A contract whose cross-chain lock is awaited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackedLock {
    pub chain_id: u64,
    pub contract_address: Address,
}

impl TrackedLock {
    pub fn new(chain_id: u64, contract_address: Address) -> Self {
        Self {
            chain_id,
            contract_address,
        }
    }
}

impl fmt::Display for TrackedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} on chain {}", self.contract_address, self.chain_id)
    }
}

/// Read-only view of the coordination contract and chain locks.
///
/// Implementations hold no per-call state so one source can serve many
/// concurrent trackers. Transport failures are returned as-is; retrying is the
/// tracker's decision, not the source's.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStatusSource: Send + Sync {
    async fn transaction_status(&self, tx: &TrackedTransaction) -> TrackerResult<StatusCode>;

    async fn transaction_timeout_height(&self, tx: &TrackedTransaction) -> TrackerResult<Height>;

    async fn current_height(&self) -> TrackerResult<Height>;

    async fn is_locked(&self, lock: &TrackedLock) -> TrackerResult<bool>;
}
