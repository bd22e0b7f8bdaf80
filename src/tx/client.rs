//! Contract deployment, calls and transactions through a signing client

use crate::chain::ChainProvider;
use crate::error::{TrackerError, TrackerResult};

use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::signers::LocalWallet;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::path::Path;
use tracing::{debug, info};

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: H256,
    pub block_number: Option<u64>,
    pub status: Option<u64>,
    pub contract_address: Option<Address>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == Some(1)
    }
}

impl From<TransactionReceipt> for Receipt {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()),
            status: receipt.status.map(|s| s.as_u64()),
            contract_address: receipt.contract_address,
        }
    }
}

/// Deploy and drive contracts on one chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContractClient: Send + Sync {
    /// Deploy `bytecode` with ABI-encoded constructor arguments
    async fn deploy(&self, bytecode: Bytes, constructor_args: Vec<Token>) -> TrackerResult<Address>;

    /// Read-only call, decoded as `outputs`
    async fn call(
        &self,
        contract: Address,
        signature: &str,
        args: Vec<Token>,
        outputs: Vec<ParamType>,
    ) -> TrackerResult<Vec<Token>>;

    /// State-changing call, waits for the receipt
    async fn send_transaction(
        &self,
        contract: Address,
        signature: &str,
        args: Vec<Token>,
    ) -> TrackerResult<Receipt>;
}

/// `ContractClient` over an ethers signing middleware.
///
/// Gas is free on the target networks, so every transaction carries a zero gas
/// price and a fixed gas limit.
pub struct EthersContractClient {
    client: SignerMiddleware<Provider<Http>, LocalWallet>,
    chain_id: u64,
    gas_limit: U256,
}

impl EthersContractClient {
    pub fn new(provider: &ChainProvider, wallet: LocalWallet, gas_limit: u64) -> Self {
        let wallet = wallet.with_chain_id(provider.chain_id());
        Self {
            client: SignerMiddleware::new(provider.http().clone(), wallet),
            chain_id: provider.chain_id(),
            gas_limit: U256::from(gas_limit),
        }
    }

    pub fn address(&self) -> Address {
        self.client.address()
    }

    async fn submit(&self, tx: TransactionRequest) -> TrackerResult<Receipt> {
        let tx = tx.gas(self.gas_limit).gas_price(U256::zero());
        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| TrackerError::Contract(format!("chain {}: {}", self.chain_id, e)))?;
        let tx_hash = pending.tx_hash();
        debug!("Transaction sent on chain {}: {:?}", self.chain_id, tx_hash);

        let receipt = pending
            .await
            .map_err(|e| TrackerError::ChainConnection {
                chain_id: self.chain_id,
                message: e.to_string(),
            })?
            .ok_or_else(|| {
                TrackerError::Contract(format!("Transaction {:?} dropped from mempool", tx_hash))
            })?;

        Ok(receipt.into())
    }
}

#[async_trait]
impl ContractClient for EthersContractClient {
    async fn deploy(&self, bytecode: Bytes, constructor_args: Vec<Token>) -> TrackerResult<Address> {
        let mut data = bytecode.to_vec();
        data.extend_from_slice(&abi::encode(&constructor_args));

        let receipt = self.submit(TransactionRequest::new().data(data)).await?;
        if !receipt.is_success() {
            return Err(TrackerError::Contract(format!(
                "Deployment {:?} reverted on chain {}",
                receipt.transaction_hash, self.chain_id
            )));
        }

        let address = receipt.contract_address.ok_or_else(|| {
            TrackerError::Contract("Deployment receipt has no contract address".to_string())
        })?;
        info!("Contract deployed on chain {} at {:?}", self.chain_id, address);
        Ok(address)
    }

    async fn call(
        &self,
        contract: Address,
        signature: &str,
        args: Vec<Token>,
        outputs: Vec<ParamType>,
    ) -> TrackerResult<Vec<Token>> {
        let data = crate::coordination::contract::encode_call(signature, &args);
        let tx: TypedTransaction = TransactionRequest::new().to(contract).data(data).into();
        let output = self
            .client
            .call(&tx, None)
            .await
            .map_err(|e| TrackerError::Contract(format!("{} failed: {}", signature, e)))?;
        abi::decode(&outputs, &output)
            .map_err(|e| TrackerError::Contract(format!("{} returned malformed data: {}", signature, e)))
    }

    async fn send_transaction(
        &self,
        contract: Address,
        signature: &str,
        args: Vec<Token>,
    ) -> TrackerResult<Receipt> {
        let data = crate::coordination::contract::encode_call(signature, &args);
        let receipt = self
            .submit(TransactionRequest::new().to(contract).data(data))
            .await?;
        debug!(
            "{} on chain {}: {:?} status {:?}",
            signature, self.chain_id, receipt.transaction_hash, receipt.status
        );
        Ok(receipt)
    }
}

/// Read compiled bytecode from a hex file (as emitted by `solc --bin`)
pub fn load_bytecode(path: &Path) -> TrackerResult<Bytes> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| TrackerError::Config(format!("Failed to read bytecode {}: {}", path.display(), e)))?;
    let bytes = hex::decode(content.trim().trim_start_matches("0x"))
        .map_err(|e| TrackerError::Config(format!("Invalid bytecode in {}: {}", path.display(), e)))?;
    Ok(bytes.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_success_follows_status() {
        let mut receipt = Receipt {
            transaction_hash: H256::zero(),
            block_number: Some(5),
            status: Some(1),
            contract_address: None,
        };
        assert!(receipt.is_success());
        receipt.status = Some(0);
        assert!(!receipt.is_success());
        receipt.status = None;
        assert!(!receipt.is_success());
    }

    #[test]
    fn loads_hex_bytecode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Contract.bin");
        std::fs::write(&path, "0x6080604052\n").unwrap();
        assert_eq!(load_bytecode(&path).unwrap().to_vec(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);

        std::fs::write(&path, "zz").unwrap();
        assert!(matches!(load_bytecode(&path), Err(TrackerError::Config(_))));
    }
}
