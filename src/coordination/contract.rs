//! Read-only client for the crosschain coordination contract

use crate::chain::ChainProvider;
use crate::error::{TrackerError, TrackerResult};

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use sha3::{Digest, Keccak256};
use std::sync::Arc;

const GET_STATUS: &str = "getCrosschainTransactionStatus(uint256,uint256)";
const GET_TIMEOUT: &str = "getCrosschainTransactionTimeout(uint256,uint256)";
const GET_BLOCK_NUMBER: &str = "getBlockNumber()";

/// Function selector: keccak256(signature)[..4]
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// ABI-encode a call to `signature` with `args`
pub fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&abi::encode(args));
    data.into()
}

/// Decode a single `uint256` return value
pub fn decode_uint(output: &[u8]) -> TrackerResult<U256> {
    let tokens = abi::decode(&[ParamType::Uint(256)], output)
        .map_err(|e| TrackerError::Rpc(format!("Malformed uint256 return data: {}", e)))?;
    tokens
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| TrackerError::Rpc("Missing uint256 return value".to_string()))
}

/// Narrow a height that must fit in u64
pub fn height_from_u256(value: U256) -> TrackerResult<u64> {
    if value > U256::from(u64::MAX) {
        return Err(TrackerError::Rpc(format!("Block number {} out of range", value)));
    }
    Ok(value.as_u64())
}

/// Coordination contract deployed on the coordination chain
pub struct CoordinationContract {
    provider: Arc<ChainProvider>,
    address: Address,
}

impl CoordinationContract {
    pub fn new(provider: Arc<ChainProvider>, address: Address) -> Self {
        Self { provider, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.provider.chain_id()
    }

    /// Raw status code of a crosschain transaction
    pub async fn transaction_status(&self, originating_chain_id: u64, tx_id: U256) -> TrackerResult<U256> {
        self.call_uint(GET_STATUS, &tx_args(originating_chain_id, tx_id))
            .await
    }

    /// Coordination block number after which the transaction is abandoned
    pub async fn transaction_timeout(&self, originating_chain_id: u64, tx_id: U256) -> TrackerResult<U256> {
        self.call_uint(GET_TIMEOUT, &tx_args(originating_chain_id, tx_id))
            .await
    }

    /// Block number as seen by the contract
    pub async fn block_number(&self) -> TrackerResult<U256> {
        self.call_uint(GET_BLOCK_NUMBER, &[]).await
    }

    async fn call_uint(&self, signature: &str, args: &[Token]) -> TrackerResult<U256> {
        let output = self
            .provider
            .call(self.address, encode_call(signature, args))
            .await?;
        decode_uint(&output)
    }
}

fn tx_args(originating_chain_id: u64, tx_id: U256) -> [Token; 2] {
    [
        Token::Uint(U256::from(originating_chain_id)),
        Token::Uint(tx_id),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_selector_followed_by_words() {
        let data = encode_call(GET_STATUS, &tx_args(22, U256::from(7)));

        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &selector(GET_STATUS));
        assert_eq!(data[4 + 31], 22);
        assert_eq!(data[4 + 63], 7);
    }

    #[test]
    fn selectors_differ_per_signature() {
        assert_ne!(selector(GET_STATUS), selector(GET_TIMEOUT));
        assert_eq!(encode_call(GET_BLOCK_NUMBER, &[]).len(), 4);
    }

    #[test]
    fn decodes_uint_return() {
        let output = abi::encode(&[Token::Uint(U256::from(3))]);
        assert_eq!(decode_uint(&output).unwrap(), U256::from(3));
        assert!(decode_uint(&[0u8; 3]).is_err());
    }

    #[test]
    fn heights_must_fit_u64() {
        assert_eq!(height_from_u256(U256::from(42)).unwrap(), 42);
        assert!(height_from_u256(U256::MAX).is_err());
    }
}
