//! Key material for externally owned accounts

use crate::error::{TrackerError, TrackerResult};

use ethers::core::rand::thread_rng;
use ethers::signers::{LocalWallet, Signer};

/// Generate a fresh secp256k1 private key, hex encoded without `0x`
pub fn generate_private_key() -> String {
    let wallet = LocalWallet::new(&mut thread_rng());
    hex::encode(wallet.signer().to_bytes())
}

/// Build a signing wallet for `chain_id` from a hex private key
pub fn wallet_from_key(private_key: &str, chain_id: u64) -> TrackerResult<LocalWallet> {
    private_key
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map(|wallet| wallet.with_chain_id(chain_id))
        .map_err(|e| TrackerError::Wallet(format!("Invalid private key: {}", e)))
}

/// Load a private key from the named environment variable
pub fn key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_usable() {
        let key = generate_private_key();
        assert_eq!(key.len(), 64);

        let wallet = wallet_from_key(&key, 22).unwrap();
        assert_eq!(wallet.chain_id(), 22);
        assert_eq!(wallet_from_key(&format!("0x{}", key), 22).unwrap().address(), wallet.address());
    }

    #[test]
    fn rejects_malformed_key() {
        assert!(matches!(
            wallet_from_key("not-a-key", 1),
            Err(TrackerError::Wallet(_))
        ));
    }
}
