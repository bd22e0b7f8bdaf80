//! Status source backed by the coordination contract and chain nodes

use super::contract::{height_from_u256, CoordinationContract};
use crate::chain::ChainManager;
use crate::error::{TrackerError, TrackerResult};
use crate::tracker::{Height, RemoteStatusSource, StatusCode, TrackedLock, TrackedTransaction};

use async_trait::async_trait;
use ethers::types::U256;
use std::sync::Arc;

/// Transaction status comes from the coordination chain; lock state comes from
/// the node of the chain that hosts the contract.
pub struct ChainStatusSource {
    coordination: Option<CoordinationContract>,
    chains: Arc<ChainManager>,
}

impl ChainStatusSource {
    pub fn new(coordination: CoordinationContract, chains: Arc<ChainManager>) -> Self {
        Self {
            coordination: Some(coordination),
            chains,
        }
    }

    /// Source that can only answer lock queries
    pub fn locks_only(chains: Arc<ChainManager>) -> Self {
        Self {
            coordination: None,
            chains,
        }
    }

    fn coordination(&self) -> TrackerResult<&CoordinationContract> {
        self.coordination.as_ref().ok_or_else(|| {
            TrackerError::ConfigurationMissing("no coordination contract bound to this source".to_string())
        })
    }
}

#[async_trait]
impl RemoteStatusSource for ChainStatusSource {
    async fn transaction_status(&self, tx: &TrackedTransaction) -> TrackerResult<StatusCode> {
        let status = self
            .coordination()?
            .transaction_status(tx.originating_chain_id, tx.transaction_id)
            .await?;
        Ok(status_code(status))
    }

    async fn transaction_timeout_height(&self, tx: &TrackedTransaction) -> TrackerResult<Height> {
        let timeout = self
            .coordination()?
            .transaction_timeout(tx.originating_chain_id, tx.transaction_id)
            .await?;
        height_from_u256(timeout)
    }

    async fn current_height(&self) -> TrackerResult<Height> {
        height_from_u256(self.coordination()?.block_number().await?)
    }

    async fn is_locked(&self, lock: &TrackedLock) -> TrackerResult<bool> {
        let provider = self.chains.get_provider(lock.chain_id)?;
        provider.is_locked(lock.contract_address).await
    }
}

/// Codes too large for u64 are saturated; any such value is unknown anyway
fn status_code(status: U256) -> StatusCode {
    if status > U256::from(u64::MAX) {
        u64::MAX
    } else {
        status.as_u64()
    }
}
