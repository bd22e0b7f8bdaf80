//! JSON-RPC provider for a single chain, including the node's cross-chain extensions

use crate::config::ChainConfig;
use crate::coordination::CoordinationContractInfo;
use crate::error::{TrackerError, TrackerResult};

use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tracing::{debug, error};

/// HTTP provider bound to one chain
pub struct ChainProvider {
    /// Chain configuration
    config: ChainConfig,
    http: Provider<Http>,
}

impl ChainProvider {
    /// Create a new chain provider
    pub fn new(config: ChainConfig) -> TrackerResult<Self> {
        let http = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| TrackerError::ChainConnection {
                chain_id: config.chain_id,
                message: format!("Invalid RPC URL {}: {}", config.rpc_url, e),
            })?
            .interval(Duration::from_millis(100));
        debug!("Added HTTP provider for chain {}: {}", config.chain_id, config.rpc_url);

        Ok(Self { config, http })
    }

    /// Get the HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        &self.http
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub async fn get_block_number(&self) -> TrackerResult<u64> {
        self.http
            .get_block_number()
            .await
            .map(|b| b.as_u64())
            .map_err(|e| self.connection_error(e))
    }

    /// Read-only contract call at the latest block
    pub async fn call(&self, to: Address, data: Bytes) -> TrackerResult<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.http
            .call(&tx, None)
            .await
            .map_err(|e| self.connection_error(e))
    }

    /// Whether a contract is locked by an in-flight cross-chain call
    pub async fn is_locked(&self, contract: Address) -> TrackerResult<bool> {
        self.http
            .request("cross_isLocked", (contract, "latest"))
            .await
            .map_err(|e| self.connection_error(e))
    }

    /// Coordination contracts this node is configured to trust
    pub async fn list_coordination_contracts(&self) -> TrackerResult<Vec<CoordinationContractInfo>> {
        self.http
            .request("cross_listCoordinationContracts", ())
            .await
            .map_err(|e| self.connection_error(e))
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        match self.get_block_number().await {
            Ok(_) => true,
            Err(e) => {
                error!("Health check failed for chain {}: {}", self.config.chain_id, e);
                false
            }
        }
    }

    fn connection_error(&self, e: ProviderError) -> TrackerError {
        TrackerError::ChainConnection {
            chain_id: self.config.chain_id,
            message: e.to_string(),
        }
    }
}
