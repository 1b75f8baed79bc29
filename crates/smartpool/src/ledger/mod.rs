pub mod watcher;

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::claims::{Claim, ClaimProof, EpochData};
use crate::error::Result;

pub use watcher::{TransactionWatcher, WatchSettings, WatchState};

pub type TxHash = H256;

/// What the node currently knows about a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxState {
    Pending,
    Confirmed { block: u64 },
    Reverted { block: u64 },
    Dropped,
}

/// Authorization to send transactions from one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub from: Address,
    pub gas_price: Option<U256>,
    pub gas_limit: Option<u64>,
}

pub trait Signer: Send + Sync {
    fn address(&self) -> Address;
    fn authorize(&self) -> Result<Authorization>;
}

/// An account held and unlocked by the node; transactions are signed node side.
#[derive(Debug, Clone)]
pub struct NodeSigner {
    address: Address,
    gas_price: Option<U256>,
    gas_limit: Option<u64>,
}

impl NodeSigner {
    pub fn new(address: Address, gas_price: Option<U256>, gas_limit: Option<u64>) -> Self {
        Self {
            address,
            gas_price,
            gas_limit,
        }
    }
}

impl Signer for NodeSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn authorize(&self) -> Result<Authorization> {
        Ok(Authorization {
            from: self.address,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
        })
    }
}

/// The pool contract.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn version(&self) -> Result<String>;
    async fn is_registered(&self, miner: Address) -> Result<bool>;
    async fn can_register(&self, miner: Address) -> Result<bool>;
    async fn claim_seed(&self, miner: Address) -> Result<U256>;

    async fn register(&self, auth: &Authorization, payment_address: Address) -> Result<TxHash>;
    async fn submit_claim(&self, auth: &Authorization, claim: &Claim) -> Result<TxHash>;
    async fn verify_claim(&self, auth: &Authorization, proof: &ClaimProof) -> Result<TxHash>;
    async fn set_epoch_data(&self, auth: &Authorization, data: &EpochData) -> Result<TxHash>;

    async fn transaction_state(&self, tx: TxHash) -> Result<TxState>;
}
