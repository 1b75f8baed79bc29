use std::sync::Arc;

use async_trait::async_trait;
use ethereum_types::{H256, H64, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::claims::merkle::u256_bytes;
use crate::error::Result;
use crate::metrics::{
    BLOCKS_FOUND, SHARES_ACCEPTED, SHARES_REJECTED, SHARES_SUBMITTED, WORK_NOT_FOUND,
};
use crate::shares::{BlockHeader, ShareAccounting, Solution, SolutionState};
use crate::work::{WorkRegistry, WorkUnit};

/// Work as the node hands it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeWork {
    pub header: BlockHeader,
    pub pow_hash: H256,
    pub seed_hash: H256,
}

/// The upstream chain node.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn get_work(&self) -> Result<NodeWork>;
    async fn submit_work(&self, nonce: H64, pow_hash: H256, mix_digest: H256) -> Result<bool>;
    async fn submit_hashrate(&self, rate: U256, id: H256) -> Result<bool>;
}

/// The `[pow hash, seed hash, share target]` triple miners poll for, all as
/// 0x-prefixed 32 byte hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPackage {
    pub pow_hash: String,
    pub seed_hash: String,
    pub target: String,
}

impl WorkPackage {
    pub fn from_unit(unit: &WorkUnit) -> Self {
        Self {
            pow_hash: format!("{:#x}", unit.pow_hash()),
            seed_hash: format!("{:#x}", unit.seed_hash()),
            target: format!("{:#x}", H256::from(u256_bytes(unit.target()))),
        }
    }

    pub fn into_array(self) -> [String; 3] {
        [self.pow_hash, self.seed_hash, self.target]
    }
}

/// Miner facing operations: hand out work at the pool's share difficulty and
/// take solutions back.
pub struct PoolService {
    node: Arc<dyn NetworkClient>,
    registry: Arc<WorkRegistry>,
    accounting: Arc<ShareAccounting>,
    share_difficulty: U256,
}

impl PoolService {
    pub fn new(
        node: Arc<dyn NetworkClient>,
        registry: Arc<WorkRegistry>,
        accounting: Arc<ShareAccounting>,
        share_difficulty: U256,
    ) -> Self {
        Self {
            node,
            registry,
            accounting,
            share_difficulty,
        }
    }

    pub fn registry(&self) -> &Arc<WorkRegistry> {
        &self.registry
    }

    pub fn accounting(&self) -> &Arc<ShareAccounting> {
        &self.accounting
    }

    pub async fn get_work(&self) -> Result<WorkPackage> {
        let work = self.node.get_work().await?;
        let unit = WorkUnit::from_pow_hash(
            work.header,
            work.pow_hash,
            work.seed_hash,
            self.share_difficulty,
        )?;
        let package = WorkPackage::from_unit(&unit);

        debug!(
            "Issuing work {} at height {}",
            unit.id(),
            unit.header().number
        );
        self.registry.add_work(unit).await;
        Ok(package)
    }

    /// Every submission is relayed upstream before it is checked, since a
    /// full block is only worth anything if it reaches the network quickly.
    /// Returns true when the solution counted as a share.
    pub async fn submit_work(&self, nonce: H64, pow_hash: H256, mix_digest: H256) -> bool {
        SHARES_SUBMITTED.inc();
        self.broadcast(nonce, pow_hash, mix_digest);

        let solution = Solution::new(nonce, pow_hash, mix_digest);
        let Some(share) = self.registry.accept_solution(&solution).await else {
            WORK_NOT_FOUND.inc();
            return false;
        };

        match share.state() {
            SolutionState::Invalid => {
                SHARES_REJECTED.inc();
                return false;
            }
            SolutionState::FullBlockSolution => {
                BLOCKS_FOUND.inc();
                info!(
                    "Block solution found at height {} with nonce {:#x}",
                    share.header().number,
                    nonce
                );
            }
            SolutionState::ValidShare => {}
        }

        SHARES_ACCEPTED.inc();
        if !self.accounting.record(share).await {
            debug!("Share with nonce {:#x} already counted", nonce);
        }
        true
    }

    pub async fn submit_hashrate(&self, rate: U256, id: H256) -> bool {
        match self.node.submit_hashrate(rate, id).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to submit hashrate for {:#x}: {}", id, e);
                false
            }
        }
    }

    fn broadcast(&self, nonce: H64, pow_hash: H256, mix_digest: H256) {
        let node = self.node.clone();
        tokio::spawn(async move {
            match node.submit_work(nonce, pow_hash, mix_digest).await {
                Ok(true) => debug!("Node accepted solution for {:#x}", pow_hash),
                Ok(false) => debug!("Node rejected solution for {:#x}", pow_hash),
                Err(e) => warn!("Failed to relay solution for {:#x}: {}", pow_hash, e),
            }
        });
    }
}
