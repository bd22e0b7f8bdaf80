//! Crosschain transaction with no parameters
//!
//! Contract 1 on the originating chain calls `set()` on contract 2 on the
//! subordinate chain:
//! - contract 2 is cleared directly so `val` reads `false`
//! - `crosschain_setter()` on contract 1 sets it through a crosschain call
//! - once contract 1 unlocks, contract 2 must read what [`ContractSimulator`]
//!   predicts for the same calls
//!
//! Every remote step and the settle delay give way to the cancellation token.

use crate::error::{TrackerError, TrackerResult};
use crate::properties::{PropertiesFile, PropertyStore};
use crate::tracker::{interruptible, pause, LifecycleTracker, TrackedLock};
use crate::tx::ContractClient;

use ethers::abi::{ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Name of the properties file for this sample
pub const SAMPLE_NAME: &str = "CrosschainTransactionNoParams";

pub const PRIVATE_KEY: &str = "PrivateKey";
pub const CONTRACT1_ADDRESS: &str = "Contract1Address";
pub const CONTRACT2_ADDRESS: &str = "Contract2Address";

/// Deployed sample contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleContracts {
    pub contract1: Address,
    pub contract2: Address,
}

/// Chain and bytecode parameters of the sample
#[derive(Debug, Clone)]
pub struct SimpleSampleParams {
    pub originating_chain_id: u64,
    pub subordinate_chain_id: u64,
    pub contract1_bytecode: Bytes,
    pub contract2_bytecode: Bytes,
    pub settle: Duration,
}

/// Local model of contract 2's `val` as driven through both contracts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractSimulator {
    val: bool,
}

impl ContractSimulator {
    /// `Contract2.clear()`
    pub fn clear(&mut self) {
        self.val = false;
    }

    /// `Contract1.crosschain_setter()`, which calls `Contract2.set()`
    pub fn crosschain_setter(&mut self) {
        self.val = true;
    }

    /// `Contract2.get()`
    pub fn get(&self) -> bool {
        self.val
    }
}

pub struct SimpleSample {
    originating: Arc<dyn ContractClient>,
    subordinate: Arc<dyn ContractClient>,
    tracker: LifecycleTracker,
    params: SimpleSampleParams,
    cancel: CancellationToken,
}

/// Key stored by an earlier run, or a fresh one
pub fn load_or_generate_key(file: &PropertiesFile) -> TrackerResult<String> {
    if file.exists() {
        let properties = file.load()?;
        return Ok(file.require(&properties, PRIVATE_KEY)?.to_string());
    }
    Ok(crate::keys::generate_private_key())
}

impl SimpleSample {
    pub fn new(
        originating: Arc<dyn ContractClient>,
        subordinate: Arc<dyn ContractClient>,
        tracker: LifecycleTracker,
        params: SimpleSampleParams,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            originating,
            subordinate,
            tracker,
            params,
            cancel,
        }
    }

    async fn step<T, F>(&self, name: &str, call: F) -> TrackerResult<T>
    where
        F: Future<Output = TrackerResult<T>>,
    {
        interruptible(&self.cancel, name, 0, call).await
    }

    /// Load contract addresses from the properties file, deploying and storing
    /// them when the file does not exist yet
    pub async fn ensure_contracts(
        &self,
        file: &PropertiesFile,
        private_key: &str,
    ) -> TrackerResult<SampleContracts> {
        if file.exists() {
            info!("Properties file exists, loading");
            let properties = file.load()?;
            let contract1 = parse_address(file.require(&properties, CONTRACT1_ADDRESS)?)?;
            let contract2 = parse_address(file.require(&properties, CONTRACT2_ADDRESS)?)?;
            info!("Loading contracts");
            info!(" Contract 1: {:?}", contract1);
            info!(" Contract 2: {:?}", contract2);
            return Ok(SampleContracts {
                contract1,
                contract2,
            });
        }

        let contracts = self.deploy().await?;

        let mut properties = BTreeMap::new();
        properties.insert(PRIVATE_KEY.to_string(), private_key.to_string());
        properties.insert(CONTRACT1_ADDRESS.to_string(), format!("{:?}", contracts.contract1));
        properties.insert(CONTRACT2_ADDRESS.to_string(), format!("{:?}", contracts.contract2));
        file.store(&properties)?;

        Ok(contracts)
    }

    /// Deploy contract 2, then contract 1 pointing at it
    pub async fn deploy(&self) -> TrackerResult<SampleContracts> {
        info!("Deploying contracts");
        let contract2 = self
            .step(
                "Contract2 deployment",
                self.subordinate
                    .deploy(self.params.contract2_bytecode.clone(), Vec::new()),
            )
            .await?;
        info!(
            " Contract 2 deployed on sidechain 2 (id={}), at address: {:?}",
            self.params.subordinate_chain_id, contract2
        );

        let contract1 = self
            .step(
                "Contract1 deployment",
                self.originating.deploy(
                    self.params.contract1_bytecode.clone(),
                    vec![
                        Token::Uint(U256::from(self.params.subordinate_chain_id)),
                        Token::Address(contract2),
                    ],
                ),
            )
            .await?;
        info!(
            " Contract 1 deployed on sidechain 1 (id={}), at address: {:?}",
            self.params.originating_chain_id, contract1
        );

        Ok(SampleContracts {
            contract1,
            contract2,
        })
    }

    /// Run the crosschain transaction and verify its effect
    pub async fn run(&self, contracts: &SampleContracts) -> TrackerResult<()> {
        info!("Running core part of sample code");
        let mut expected = ContractSimulator::default();

        info!(" Set state in each contract to known values.");
        info!("  Single-chain transaction: Contract2.clear()");
        let receipt = self
            .step(
                "Contract2.clear()",
                self.subordinate
                    .send_transaction(contracts.contract2, "clear()", Vec::new()),
            )
            .await?;
        ensure(receipt.is_success(), "Contract2.clear() reverted")?;
        expected.clear();

        self.check_expected_value(contracts, expected.get()).await?;

        info!("  Executing crosschain transaction");
        let receipt = self
            .step(
                "Contract1.crosschain_setter()",
                self.originating.send_transaction(
                    contracts.contract1,
                    "crosschain_setter()",
                    Vec::new(),
                ),
            )
            .await?;
        info!("  Transaction receipt: {:?}", receipt);
        ensure(receipt.is_success(), "Contract1.crosschain_setter() reverted")?;
        expected.crosschain_setter();

        let lock = TrackedLock::new(self.params.originating_chain_id, contracts.contract1);
        self.tracker.await_unlocked(&lock).await?;
        pause(&self.cancel, "settle delay", self.params.settle).await?;

        self.check_expected_value(contracts, expected.get()).await
    }

    async fn check_expected_value(&self, contracts: &SampleContracts, expected: bool) -> TrackerResult<()> {
        info!(" Check values have been set as expected");
        let value = self
            .step(
                "Contract2.get()",
                self.subordinate
                    .call(contracts.contract2, "get()", Vec::new(), vec![ParamType::Bool]),
            )
            .await?
            .into_iter()
            .next()
            .and_then(Token::into_bool)
            .ok_or_else(|| TrackerError::Contract("Contract2.get() returned no bool".to_string()))?;

        info!("  Contract2.val = {}, expecting {}", value, expected);
        ensure(
            value == expected,
            &format!("Contract2.val = {}, expected {}", value, expected),
        )
    }
}

fn ensure(condition: bool, message: &str) -> TrackerResult<()> {
    if condition {
        Ok(())
    } else {
        Err(TrackerError::Assertion(message.to_string()))
    }
}

fn parse_address(value: &str) -> TrackerResult<Address> {
    value
        .parse()
        .map_err(|e| TrackerError::Properties(format!("Invalid address {}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::source::MockRemoteStatusSource;
    use crate::tracker::PollingPolicy;
    use crate::tx::{MockContractClient, Receipt};

    use ethers::types::H256;
    use tokio_util::sync::CancellationToken;

    fn receipt(status: u64) -> Receipt {
        Receipt {
            transaction_hash: H256::repeat_byte(0xab),
            block_number: Some(10),
            status: Some(status),
            contract_address: None,
        }
    }

    fn params() -> SimpleSampleParams {
        SimpleSampleParams {
            originating_chain_id: 22,
            subordinate_chain_id: 33,
            contract1_bytecode: Bytes::from(vec![0x60, 0x01]),
            contract2_bytecode: Bytes::from(vec![0x60, 0x02]),
            settle: Duration::from_millis(3000),
        }
    }

    fn contracts() -> SampleContracts {
        SampleContracts {
            contract1: Address::repeat_byte(0x01),
            contract2: Address::repeat_byte(0x02),
        }
    }

    fn unlocking_source() -> MockRemoteStatusSource {
        let mut source = MockRemoteStatusSource::new();
        let mut polls = 0;
        source.expect_is_locked().returning(move |lock| {
            assert_eq!(lock.chain_id, 22);
            polls += 1;
            Ok(polls < 3)
        });
        source
    }

    fn sample(
        originating: MockContractClient,
        subordinate: MockContractClient,
        source: MockRemoteStatusSource,
    ) -> SimpleSample {
        cancellable_sample(originating, subordinate, source, CancellationToken::new())
    }

    fn cancellable_sample(
        originating: MockContractClient,
        subordinate: MockContractClient,
        source: MockRemoteStatusSource,
        cancel: CancellationToken,
    ) -> SimpleSample {
        let tracker = LifecycleTracker::new(Arc::new(source), PollingPolicy::default(), cancel.clone());
        SimpleSample::new(
            Arc::new(originating),
            Arc::new(subordinate),
            tracker,
            params(),
            cancel,
        )
    }

    #[test]
    fn simulator_predicts_contract2_value() {
        let mut sim = ContractSimulator::default();
        sim.crosschain_setter();
        sim.clear();
        assert!(!sim.get());
        sim.crosschain_setter();
        assert!(sim.get());
    }

    #[tokio::test(start_paused = true)]
    async fn crosschain_setter_flips_contract2() {
        let mut subordinate = MockContractClient::new();
        subordinate
            .expect_send_transaction()
            .times(1)
            .returning(|_, _, _| Ok(receipt(1)));
        let mut reads = 0;
        subordinate.expect_call().times(2).returning(move |_, _, _, _| {
            reads += 1;
            Ok(vec![Token::Bool(reads > 1)])
        });

        let mut originating = MockContractClient::new();
        originating
            .expect_send_transaction()
            .times(1)
            .returning(|_, _, _| Ok(receipt(1)));

        sample(originating, subordinate, unlocking_source())
            .run(&contracts())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_value_is_an_assertion_failure() {
        let mut subordinate = MockContractClient::new();
        subordinate
            .expect_send_transaction()
            .returning(|_, _, _| Ok(receipt(1)));
        subordinate
            .expect_call()
            .returning(|_, _, _, _| Ok(vec![Token::Bool(false)]));

        let mut originating = MockContractClient::new();
        originating
            .expect_send_transaction()
            .returning(|_, _, _| Ok(receipt(1)));

        let err = sample(originating, subordinate, unlocking_source())
            .run(&contracts())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Assertion(_)));
    }

    #[tokio::test]
    async fn reverted_originating_transaction_stops_before_waiting() {
        let mut subordinate = MockContractClient::new();
        subordinate
            .expect_send_transaction()
            .returning(|_, _, _| Ok(receipt(1)));
        subordinate
            .expect_call()
            .times(1)
            .returning(|_, _, _, _| Ok(vec![Token::Bool(false)]));

        let mut originating = MockContractClient::new();
        originating
            .expect_send_transaction()
            .returning(|_, _, _| Ok(receipt(0)));

        let mut source = MockRemoteStatusSource::new();
        source.expect_is_locked().never();

        let err = sample(originating, subordinate, source)
            .run(&contracts())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Assertion(_)));
    }

    #[tokio::test]
    async fn deploys_once_then_reuses_properties() {
        let dir = tempfile::tempdir().unwrap();
        let file = PropertiesFile::new(dir.path(), SAMPLE_NAME);
        let key = load_or_generate_key(&file).unwrap();

        let mut subordinate = MockContractClient::new();
        subordinate
            .expect_deploy()
            .times(1)
            .returning(|_, args| {
                assert!(args.is_empty());
                Ok(Address::repeat_byte(0x02))
            });
        let mut originating = MockContractClient::new();
        originating
            .expect_deploy()
            .times(1)
            .returning(|_, args| {
                assert_eq!(args[0], Token::Uint(U256::from(33)));
                assert_eq!(args[1], Token::Address(Address::repeat_byte(0x02)));
                Ok(Address::repeat_byte(0x01))
            });

        let sample = sample(originating, subordinate, MockRemoteStatusSource::new());
        let deployed = sample.ensure_contracts(&file, &key).await.unwrap();
        assert_eq!(deployed, contracts());

        // Second run reads the file; the mocks would panic on another deploy
        let reloaded = sample.ensure_contracts(&file, &key).await.unwrap();
        assert_eq!(reloaded, deployed);
        assert_eq!(load_or_generate_key(&file).unwrap(), key);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_settle_delay_skips_final_read() {
        let mut subordinate = MockContractClient::new();
        subordinate
            .expect_send_transaction()
            .returning(|_, _, _| Ok(receipt(1)));
        // Only the read before the crosschain call happens
        subordinate
            .expect_call()
            .times(1)
            .returning(|_, _, _, _| Ok(vec![Token::Bool(false)]));

        let mut originating = MockContractClient::new();
        originating
            .expect_send_transaction()
            .returning(|_, _, _| Ok(receipt(1)));

        let cancel = CancellationToken::new();
        let sample = cancellable_sample(originating, subordinate, unlocking_source(), cancel.clone());

        // Unlocked on the third lock poll at 300ms; cancel lands inside the 3s settle delay
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                cancel.cancel();
            }
        });

        let start = tokio::time::Instant::now();
        let err = sample.run(&contracts()).await.unwrap_err();

        assert!(matches!(
            err,
            TrackerError::Interrupted { ref target, .. } if target == "settle delay"
        ));
        assert!(start.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_any_transaction() {
        let mut subordinate = MockContractClient::new();
        subordinate
            .expect_send_transaction()
            .returning(|_, _, _| Ok(receipt(1)));
        subordinate.expect_call().never();
        let originating = MockContractClient::new();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = cancellable_sample(originating, subordinate, MockRemoteStatusSource::new(), cancel)
            .run(&contracts())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TrackerError::Interrupted { ref target, polls: 0 } if target == "Contract2.clear()"
        ));
    }
}
