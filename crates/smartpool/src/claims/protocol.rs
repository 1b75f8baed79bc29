use std::sync::Arc;

use ethereum_types::{Address, U256};
use tracing::{error, info};

use super::{Claim, ClaimProof, EpochData};
use crate::error::Result;
use crate::ledger::{Ledger, Signer, TransactionWatcher, TxHash, WatchSettings};

/// The pool's side of the contract: every write is authorized by the signer,
/// submitted, then waited on until it is confirmed or fails. Nothing is retried.
pub struct ClaimProtocol {
    ledger: Arc<dyn Ledger>,
    signer: Arc<dyn Signer>,
    watch: WatchSettings,
}

impl ClaimProtocol {
    pub fn new(ledger: Arc<dyn Ledger>, signer: Arc<dyn Signer>, watch: WatchSettings) -> Self {
        Self {
            ledger,
            signer,
            watch,
        }
    }

    pub fn miner(&self) -> Address {
        self.signer.address()
    }

    pub async fn version(&self) -> Result<String> {
        self.ledger.version().await
    }

    pub async fn is_registered(&self) -> Result<bool> {
        self.ledger.is_registered(self.miner()).await
    }

    pub async fn can_register(&self) -> Result<bool> {
        self.ledger.can_register(self.miner()).await
    }

    pub async fn register(&self, payment_address: Address) -> Result<()> {
        let auth = self.signer.authorize()?;
        let tx = self
            .ledger
            .register(&auth, payment_address)
            .await
            .inspect_err(|e| error!("Registering address {:#x} failed: {}", payment_address, e))?;
        info!("Registering address {:#x} by tx {:#x}", payment_address, tx);

        self.confirm(tx).await?;
        info!("Registered address {:#x}, tx {:#x} confirmed", payment_address, tx);
        Ok(())
    }

    /// Read failures are returned to the caller. A zero seed is a legitimate
    /// value and must not stand in for an error.
    pub async fn get_claim_seed(&self) -> Result<U256> {
        self.ledger
            .claim_seed(self.miner())
            .await
            .inspect_err(|e| error!("Getting claim seed failed: {}", e))
    }

    pub async fn submit_claim(&self, claim: &Claim) -> Result<()> {
        let auth = self.signer.authorize()?;
        let tx = self
            .ledger
            .submit_claim(&auth, claim)
            .await
            .inspect_err(|e| error!("Submitting claim {} failed: {}", claim.id, e))?;
        info!(
            "Submitted claim {} ({} shares, root {:#x}) by tx {:#x}",
            claim.id, claim.num_shares, claim.aug_merkle, tx
        );
        self.confirm(tx).await
    }

    pub async fn verify_claim(&self, proof: &ClaimProof) -> Result<()> {
        let auth = self.signer.authorize()?;
        let tx = self
            .ledger
            .verify_claim(&auth, proof)
            .await
            .inspect_err(|e| error!("Verifying claim failed: {}", e))?;
        info!("Verifying share {} by tx {:#x}", proof.share_index, tx);
        self.confirm(tx).await
    }

    pub async fn set_epoch_data(&self, data: &EpochData) -> Result<()> {
        let auth = self.signer.authorize()?;
        let tx = self
            .ledger
            .set_epoch_data(&auth, data)
            .await
            .inspect_err(|e| error!("Setting epoch data failed: {}", e))?;
        info!("Setting epoch data for epochs {:?} by tx {:#x}", data.epochs, tx);
        self.confirm(tx).await
    }

    async fn confirm(&self, tx: TxHash) -> Result<()> {
        TransactionWatcher::new(self.ledger.clone(), tx, self.watch)
            .wait()
            .await
            .map(|_| ())
    }
}
