use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::claims::{build_proof, Claim, ClaimProtocol, ClaimRecord, DatasetProver};
use crate::config::PoolConfig;
use crate::database::ClaimStore;
use crate::error::{PoolError, Result};
use crate::metrics::{CLAIMS_SUBMITTED, CLAIM_FAILURES};
use crate::service::PoolService;

/// Drives the pool's side of the contract: registration, periodic claims
/// over the accumulated shares and the verification that follows each one.
pub struct SmartPool {
    protocol: ClaimProtocol,
    service: Arc<PoolService>,
    store: Arc<dyn ClaimStore>,
    prover: Arc<dyn DatasetProver>,
    config: PoolConfig,
    epochs_set: Mutex<HashSet<u64>>,
}

impl SmartPool {
    pub fn new(
        config: PoolConfig,
        protocol: ClaimProtocol,
        service: Arc<PoolService>,
        store: Arc<dyn ClaimStore>,
        prover: Arc<dyn DatasetProver>,
    ) -> Self {
        Self {
            protocol,
            service,
            store,
            prover,
            config,
            epochs_set: Mutex::new(HashSet::new()),
        }
    }

    pub fn protocol(&self) -> &ClaimProtocol {
        &self.protocol
    }

    pub fn service(&self) -> &Arc<PoolService> {
        &self.service
    }

    pub async fn ensure_registered(&self) -> Result<()> {
        if self.protocol.is_registered().await? {
            info!("Miner {:#x} is already registered", self.protocol.miner());
            return Ok(());
        }
        if !self.protocol.can_register().await? {
            return Err(PoolError::CannotRegister);
        }
        self.protocol.register(self.config.payment_address).await
    }

    /// Freezes the current share window into a claim, submits it and answers
    /// the challenge. Returns `None` when there was nothing to claim.
    pub async fn run_claim_cycle(&self) -> Result<Option<Claim>> {
        let accounting = self.service.accounting();
        let (min, max) = (self.config.claim_min_difficulty, self.config.claim_max_difficulty);

        let Some(shares) = accounting.freeze(min, max, self.config.min_claim_shares).await else {
            debug!("No claimable shares yet");
            return Ok(None);
        };
        let Some(record) = ClaimRecord::build(shares.clone(), min, max) else {
            accounting.restore(shares).await;
            return Ok(None);
        };

        if let Err(e) = self.protocol.submit_claim(&record.claim).await {
            CLAIM_FAILURES.inc();
            warn!(
                "Claim {} not accepted, returning {} shares to the window",
                record.claim.id,
                record.shares.len()
            );
            accounting.restore(record.shares).await;
            return Err(e);
        }
        CLAIMS_SUBMITTED.inc();

        // the claim is on chain at this point; losing the record only costs history
        if let Err(e) = self.store.save_claim(&record).await {
            error!("Failed to persist claim {}: {}", record.claim.id, e);
        }

        self.prove(&record).await.inspect_err(|_| CLAIM_FAILURES.inc())?;
        Ok(Some(record.claim))
    }

    pub async fn respond_to_challenge(&self, claim_id: Uuid) -> Result<()> {
        let record = self
            .store
            .get_claim(claim_id)
            .await?
            .ok_or_else(|| PoolError::ClaimNotFound(claim_id.to_string()))?;
        self.prove(&record).await
    }

    /// Claims every `claim_interval` until `shutdown` resolves. Failures are
    /// logged and the next tick tries again.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(self.config.claim_interval);
        interval.tick().await;
        let max_age = Duration::seconds(self.config.work_max_age.as_secs() as i64);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Claim loop stopping");
                    return;
                }
                _ = interval.tick() => {
                    let pruned = self.service.registry().prune(max_age).await;
                    let forgotten = self.service.accounting().prune_claimed(max_age).await;
                    if pruned > 0 || forgotten > 0 {
                        debug!(
                            "Pruned {} stale work units and {} claimed shares",
                            pruned, forgotten
                        );
                    }

                    match self.run_claim_cycle().await {
                        Ok(Some(claim)) => info!(
                            "Claim {} over {} shares verified",
                            claim.id, claim.num_shares
                        ),
                        Ok(None) => {}
                        Err(e) => error!("Claim cycle failed: {}", e),
                    }
                }
            }
        }
    }

    async fn prove(&self, record: &ClaimRecord) -> Result<()> {
        let seed = self.protocol.get_claim_seed().await?;
        let index = record.challenged_index(seed);
        let (share, _) = record.branch(index)?;
        debug!(
            "Seed {:#x} challenges share {} of claim {}",
            seed, index, record.claim.id
        );

        self.ensure_epoch_data(share.header().epoch()).await?;
        let proof = build_proof(record, index, self.prover.as_ref())?;
        self.protocol.verify_claim(&proof).await
    }

    async fn ensure_epoch_data(&self, epoch: u64) -> Result<()> {
        let mut epochs = self.epochs_set.lock().await;
        if epochs.contains(&epoch) {
            return Ok(());
        }
        let data = self.prover.epoch_data(epoch)?;
        self.protocol.set_epoch_data(&data).await?;
        epochs.insert(epoch);
        Ok(())
    }
}
