//! Chain module - connections to every configured chain
//!
//! Providers are indexed by chain ID; names from the configuration resolve to
//! IDs so commands can refer to chains the way the config file does.

pub mod provider;

pub use provider::ChainProvider;

use crate::config::Settings;
use crate::error::{TrackerError, TrackerResult};

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Manages connections to all configured chains
pub struct ChainManager {
    /// Chain providers indexed by chain ID
    providers: DashMap<u64, Arc<ChainProvider>>,
    /// Config name -> chain ID
    names: DashMap<String, u64>,
}

impl ChainManager {
    /// Create a chain manager with all enabled chains
    pub fn new(settings: &Settings) -> TrackerResult<Self> {
        let providers = DashMap::new();
        let names = DashMap::new();

        for (name, chain_config) in settings.enabled_chains() {
            info!(
                "Initializing chain {} (ID: {})",
                chain_config.name, chain_config.chain_id
            );

            let provider = ChainProvider::new(chain_config.clone())?;
            if providers
                .insert(chain_config.chain_id, Arc::new(provider))
                .is_some()
            {
                warn!("Chain ID {} configured more than once", chain_config.chain_id);
            }
            names.insert(name.clone(), chain_config.chain_id);
        }

        Ok(Self { providers, names })
    }

    /// Get provider for a specific chain
    pub fn get_provider(&self, chain_id: u64) -> TrackerResult<Arc<ChainProvider>> {
        self.providers
            .get(&chain_id)
            .map(|p| p.clone())
            .ok_or(TrackerError::ChainNotFound {
                name: chain_id.to_string(),
            })
    }

    /// Get provider by configured chain name
    pub fn get_by_name(&self, name: &str) -> TrackerResult<Arc<ChainProvider>> {
        let chain_id = self
            .names
            .get(name)
            .map(|id| *id)
            .ok_or_else(|| TrackerError::ChainNotFound {
                name: name.to_string(),
            })?;
        self.get_provider(chain_id)
    }

    /// Health check for all chains
    pub async fn health_check(&self) -> Vec<(u64, bool)> {
        let providers: Vec<_> = self.providers.iter().map(|e| e.value().clone()).collect();
        let mut results = Vec::new();

        for provider in providers {
            let healthy = provider.health_check().await;
            results.push((provider.chain_id(), healthy));

            crate::metrics::record_chain_health(provider.chain_id(), healthy);
        }

        results
    }

    /// Get all connected chain IDs
    pub fn connected_chains(&self) -> Vec<u64> {
        self.providers.iter().map(|e| *e.key()).collect()
    }
}
