//! Transaction submission: contract deployment, calls and state-changing transactions

mod client;

pub use client::{load_bytecode, ContractClient, EthersContractClient, Receipt};

#[cfg(test)]
pub use client::MockContractClient;
