//! Configuration management for the cross-chain tracker
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::tracker::LockWaitMode;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tracker: TrackerConfig,
    pub coordination: Option<CoordinationConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub properties: PropertiesConfig,
    pub chains: HashMap<String, ChainConfig>,
    #[serde(default)]
    pub samples: SamplesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub poll_interval_ms: u64,
    pub max_not_started_polls: u32,
    pub lock_poll_interval_ms: u64,
    pub max_wait_polls: u32,
    pub lock_wait_mode: LockWaitMode,
    pub enforce_timeout_height: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            max_not_started_polls: 5,
            lock_poll_interval_ms: 100,
            max_wait_polls: 10,
            lock_wait_mode: LockWaitMode::Diagnostic,
            enforce_timeout_height: false,
        }
    }
}

/// Explicit coordination contract location. When absent, it is discovered
/// from the node of `discover_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinationConfig {
    pub chain_id: Option<u64>,
    pub rpc_url: Option<String>,
    pub contract_address: Option<String>,
    pub discover_from: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9100
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub private_key_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: "CROSSCHAIN_PRIVATE_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PropertiesConfig {
    pub dir: PathBuf,
}

impl Default for PropertiesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SamplesConfig {
    pub simple: Option<SimpleSampleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleSampleConfig {
    /// Chain hosting contract 1 and the originating transaction
    pub originating_chain: String,
    /// Chain hosting contract 2
    pub subordinate_chain: String,
    pub contract1_bytecode: PathBuf,
    pub contract2_bytecode: PathBuf,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Delay after the lock is released before values are checked
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_gas_limit() -> u64 {
    4_300_000
}

fn default_settle_ms() -> u64 {
    3000
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("CROSSCHAIN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse and validate a configuration document
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        for (name, chain) in &self.chains {
            if chain.enabled && chain.rpc_url.is_empty() {
                anyhow::bail!("Chain {} has no RPC URL configured", name);
            }
        }

        if self.tracker.max_not_started_polls == 0 {
            anyhow::bail!("tracker.max_not_started_polls must be at least 1");
        }
        if self.tracker.poll_interval_ms == 0 || self.tracker.lock_poll_interval_ms == 0 {
            anyhow::bail!("Polling intervals must be non-zero");
        }

        if let Some(coordination) = &self.coordination {
            let explicit = coordination.contract_address.is_some();
            if explicit && (coordination.chain_id.is_none() || coordination.rpc_url.is_none()) {
                anyhow::bail!(
                    "coordination.contract_address requires coordination.chain_id and coordination.rpc_url"
                );
            }
            if let Some(chain) = &coordination.discover_from {
                if !self.chains.contains_key(chain) {
                    anyhow::bail!("coordination.discover_from names unknown chain {}", chain);
                }
            }
        }

        if let Some(simple) = &self.samples.simple {
            for chain in [&simple.originating_chain, &simple.subordinate_chain] {
                if !self.chains.contains_key(chain) {
                    anyhow::bail!("samples.simple names unknown chain {}", chain);
                }
            }
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
