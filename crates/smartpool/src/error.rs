use std::time::Duration;

use ethereum_types::{H256, U256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Database error: {0}")]
    Database(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("RPC transport error: {0}")]
    Rpc(#[from] jsonrpsee::core::ClientError),

    #[error("RPC error {code}: {message}")]
    RpcResponse { code: i64, message: String },

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Invalid share difficulty: {0}")]
    InvalidDifficulty(U256),

    #[error("Ledger call {call} failed: {reason}")]
    Ledger { call: &'static str, reason: String },

    #[error("Transaction {0:#x} was reverted")]
    TransactionFailed(H256),

    #[error("Transaction {0:#x} was dropped by the node")]
    TransactionDropped(H256),

    #[error("Transaction {tx:#x} not confirmed after {waited:?}")]
    ConfirmationTimeout { tx: H256, waited: Duration },

    #[error("Miner address is not registered and cannot register")]
    CannotRegister,

    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Share index {index} out of range for claim of {num_shares} shares")]
    ShareIndexOutOfRange { index: U256, num_shares: u64 },

    #[error("Dataset proof error: {0}")]
    Dataset(String),

    #[error("Pending block does not hash to work {0:#x}")]
    HeaderMismatch(H256),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PoolError {
    pub fn ledger(call: &'static str, reason: impl ToString) -> Self {
        PoolError::Ledger {
            call,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
