//! Crosschain tracker - sample client for coordinated crosschain transactions
//!
//! Watches crosschain transactions on the coordination contract, waits for
//! contract locks to clear, and runs the simple crosschain transaction sample.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ethers::types::U256;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crosschain_tracker::chain::ChainManager;
use crosschain_tracker::config::Settings;
use crosschain_tracker::coordination::{ChainStatusSource, CoordinationContract, CoordinationSetup};
use crosschain_tracker::metrics::MetricsServer;
use crosschain_tracker::properties::{PropertiesFile, PropertyStore};
use crosschain_tracker::samples::simple::{load_or_generate_key, SAMPLE_NAME};
use crosschain_tracker::samples::{watch_transactions, SimpleSample, SimpleSampleParams};
use crosschain_tracker::tracker::interruptible;
use crosschain_tracker::tx::{load_bytecode, EthersContractClient};
use crosschain_tracker::{keys, LifecycleTracker, PollingPolicy, TrackedLock, TrackedTransaction};

#[derive(Parser)]
#[command(name = "crosschain-tracker", version, about)]
struct Cli {
    /// Configuration file (overrides CROSSCHAIN_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for crosschain transactions to commit or be ignored
    Watch {
        /// Chain ID that originated the transactions
        #[arg(long)]
        origin_chain: u64,
        /// Crosschain transaction IDs (decimal or 0x-hex)
        #[arg(long = "tx-id", required = true)]
        tx_ids: Vec<String>,
    },
    /// Wait for a contract's crosschain lock to be released
    WaitUnlocked {
        /// Chain name from the configuration
        #[arg(long)]
        chain: String,
        #[arg(long)]
        contract: String,
    },
    /// Run the simple crosschain transaction sample
    Simple {
        /// Start from and leave behind a clean properties file
        #[arg(long)]
        automated: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    info!("Starting crosschain tracker v{}", env!("CARGO_PKG_VERSION"));

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    info!(
        "Loaded configuration for {} chains",
        settings.enabled_chains().len()
    );

    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    let chains = Arc::new(ChainManager::new(&settings)?);
    info!("Chain connections initialized: {:?}", chains.connected_chains());
    for (chain_id, healthy) in chains.health_check().await {
        if !healthy {
            warn!("Chain {} health check failed", chain_id);
        }
    }

    // Ctrl-C interrupts any wait in progress
    let cancel = CancellationToken::new();
    let signal_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping...");
            cancel.cancel();
        }
    });

    let policy = PollingPolicy::from(&settings.tracker);
    let result = match cli.command {
        Command::Watch {
            origin_chain,
            tx_ids,
        } => watch(&settings, chains, policy, cancel, origin_chain, &tx_ids).await,
        Command::WaitUnlocked { chain, contract } => {
            wait_unlocked(chains, policy, cancel, &chain, &contract).await
        }
        Command::Simple { automated } => simple(&settings, chains, policy, cancel, automated).await,
    };

    signal_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    result
}

async fn watch(
    settings: &Settings,
    chains: Arc<ChainManager>,
    policy: PollingPolicy,
    cancel: CancellationToken,
    origin_chain: u64,
    tx_ids: &[String],
) -> Result<()> {
    let transactions = tx_ids
        .iter()
        .map(|id| parse_tx_id(id).map(|tx_id| TrackedTransaction::new(origin_chain, tx_id)))
        .collect::<Result<Vec<_>>>()?;

    let fallback_chain = settings
        .chains
        .iter()
        .find(|(_, c)| c.enabled && c.chain_id == origin_chain)
        .or_else(|| settings.enabled_chains().into_iter().next())
        .map(|(name, _)| name.clone())
        .context("No enabled chain to discover the coordination contract from")?;

    let coordination = connect_coordination(settings, &chains, &fallback_chain, &cancel).await?;
    let source = Arc::new(ChainStatusSource::new(coordination, chains));
    let tracker = LifecycleTracker::new(source, policy, cancel);

    let mut failures = 0;
    for (tx, result) in watch_transactions(&tracker, &transactions).await {
        match result {
            Ok(outcome) if outcome.is_committed() => {
                info!("Crosschain transaction {}: {}", tx, outcome)
            }
            Ok(outcome) => warn!("Crosschain transaction {}: {} by the coordination vote", tx, outcome),
            Err(e) if e.is_terminal_failure() => {
                error!("Crosschain transaction {}: {}", tx, e);
                failures += 1;
            }
            Err(e) => {
                error!(
                    "Crosschain transaction {}: {} (retryable: {})",
                    tx,
                    e,
                    e.is_retryable()
                );
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} transactions did not complete", failures, transactions.len());
    }
    Ok(())
}

async fn wait_unlocked(
    chains: Arc<ChainManager>,
    policy: PollingPolicy,
    cancel: CancellationToken,
    chain: &str,
    contract: &str,
) -> Result<()> {
    let provider = chains.get_by_name(chain)?;
    let contract_address = contract
        .parse()
        .with_context(|| format!("Invalid contract address: {}", contract))?;
    let lock = TrackedLock::new(provider.chain_id(), contract_address);

    let tracker = LifecycleTracker::new(Arc::new(ChainStatusSource::locks_only(chains)), policy, cancel);
    let unlocked = tracker.await_unlocked(&lock).await?;
    info!("Contract {} unlocked after {} polls", lock, unlocked.polls);
    Ok(())
}

async fn simple(
    settings: &Settings,
    chains: Arc<ChainManager>,
    policy: PollingPolicy,
    cancel: CancellationToken,
    automated: bool,
) -> Result<()> {
    info!("Crosschain Transaction - No Parameters - started");
    let config = settings
        .samples
        .simple
        .clone()
        .context("[samples.simple] is not configured")?;

    let file = PropertiesFile::new(&settings.properties.dir, SAMPLE_NAME);
    if automated {
        // Start clean so all contracts are redeployed
        file.delete()?;
    }

    let private_key = match keys::key_from_env(&settings.wallet.private_key_env) {
        Some(key) => key,
        None => load_or_generate_key(&file)?,
    };

    let originating = chains.get_by_name(&config.originating_chain)?;
    let subordinate = chains.get_by_name(&config.subordinate_chain)?;
    let wallet = keys::wallet_from_key(&private_key, originating.chain_id())?;

    let originating_client = EthersContractClient::new(&originating, wallet.clone(), config.gas_limit);
    let subordinate_client = EthersContractClient::new(&subordinate, wallet, config.gas_limit);
    info!(
        "Using credentials which correspond to account: {:?}",
        originating_client.address()
    );

    let coordination =
        connect_coordination(settings, &chains, &config.originating_chain, &cancel).await?;
    let source = Arc::new(ChainStatusSource::new(coordination, chains.clone()));
    let tracker = LifecycleTracker::new(source, policy, cancel.clone());

    let params = SimpleSampleParams {
        originating_chain_id: originating.chain_id(),
        subordinate_chain_id: subordinate.chain_id(),
        contract1_bytecode: load_bytecode(&config.contract1_bytecode)?,
        contract2_bytecode: load_bytecode(&config.contract2_bytecode)?,
        settle: Duration::from_millis(config.settle_ms),
    };
    let sample = SimpleSample::new(
        Arc::new(originating_client),
        Arc::new(subordinate_client),
        tracker,
        params,
        cancel,
    );

    let contracts = sample.ensure_contracts(&file, &private_key).await?;
    sample.run(&contracts).await?;

    if automated {
        file.delete()?;
    }
    info!("Crosschain Transaction - No Parameters - completed");
    Ok(())
}

/// Resolve the coordination contract, giving way to Ctrl-C
async fn connect_coordination(
    settings: &Settings,
    chains: &ChainManager,
    fallback_chain: &str,
    cancel: &CancellationToken,
) -> Result<CoordinationContract> {
    let setup = interruptible(
        cancel,
        "coordination setup",
        0,
        CoordinationSetup::resolve(settings.coordination.as_ref(), chains, fallback_chain),
    )
    .await?;
    let contract = setup.connect()?;
    info!(
        "Using coordination contract {:?} on chain {}",
        contract.address(),
        contract.chain_id()
    );
    Ok(contract)
}

fn parse_tx_id(id: &str) -> Result<U256> {
    let parsed = match id.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| anyhow::anyhow!("{}", e)),
        None => U256::from_dec_str(id).map_err(|e| anyhow::anyhow!("{}", e)),
    };
    parsed.with_context(|| format!("Invalid crosschain transaction id: {}", id))
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,crosschain_tracker=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
