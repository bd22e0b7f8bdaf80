//! Locating the crosschain coordination contract
//!
//! Every node of a multichain deployment must trust the same coordination
//! contract. It is either named in the configuration or taken from the first
//! entry a node reports through `cross_listCoordinationContracts`.

use super::contract::CoordinationContract;
use crate::chain::{ChainManager, ChainProvider};
use crate::config::{ChainConfig, CoordinationConfig};
use crate::error::{TrackerError, TrackerResult};

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// One coordination contract entry reported by a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationContractInfo {
    pub coordination_blockchain_id: U256,
    pub coordination_contract: Address,
    pub ip_address_and_port: String,
}

/// Resolved coordination contract location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinationSetup {
    pub chain_id: u64,
    pub contract_address: Address,
    pub rpc_url: String,
}

impl CoordinationSetup {
    /// Pick the coordination contract from a node's list
    pub fn from_listing(infos: Vec<CoordinationContractInfo>) -> TrackerResult<Self> {
        let Some(info) = infos.into_iter().next() else {
            error!("No crosschain coordination contract appears to have been configured");
            return Err(TrackerError::ConfigurationMissing(
                "node reports no crosschain coordination contract; configure the multichain node first"
                    .to_string(),
            ));
        };

        if info.coordination_blockchain_id > U256::from(u64::MAX) {
            return Err(TrackerError::Config(format!(
                "Coordination blockchain ID {} out of range",
                info.coordination_blockchain_id
            )));
        }

        Ok(Self {
            chain_id: info.coordination_blockchain_id.as_u64(),
            contract_address: info.coordination_contract,
            rpc_url: format!("http://{}/", info.ip_address_and_port),
        })
    }

    /// Ask a node which coordination contract it trusts
    pub async fn discover(provider: &ChainProvider) -> TrackerResult<Self> {
        let infos = provider.list_coordination_contracts().await?;
        let setup = Self::from_listing(infos)?;
        info!(
            "Discovered coordination contract {:?} on chain {} via chain {}",
            setup.contract_address,
            setup.chain_id,
            provider.chain_id()
        );
        Ok(setup)
    }

    /// Resolve from configuration, discovering when no address is given
    pub async fn resolve(
        config: Option<&CoordinationConfig>,
        chains: &ChainManager,
        fallback_chain: &str,
    ) -> TrackerResult<Self> {
        if let Some(CoordinationConfig {
            chain_id: Some(chain_id),
            rpc_url: Some(rpc_url),
            contract_address: Some(address),
            ..
        }) = config
        {
            let contract_address = address
                .parse()
                .map_err(|e| TrackerError::Config(format!("Invalid coordination address: {}", e)))?;
            return Ok(Self {
                chain_id: *chain_id,
                contract_address,
                rpc_url: rpc_url.clone(),
            });
        }

        let discover_from = config
            .and_then(|c| c.discover_from.as_deref())
            .unwrap_or(fallback_chain);
        let provider = chains.get_by_name(discover_from)?;
        Self::discover(&provider).await
    }

    /// Connect to the coordination chain and bind the contract
    pub fn connect(&self) -> TrackerResult<CoordinationContract> {
        let provider = ChainProvider::new(ChainConfig {
            chain_id: self.chain_id,
            name: "coordination".to_string(),
            rpc_url: self.rpc_url.clone(),
            enabled: true,
        })?;
        Ok(CoordinationContract::new(
            Arc::new(provider),
            self.contract_address,
        ))
    }
}
