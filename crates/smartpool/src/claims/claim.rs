use chrono::{DateTime, Utc};
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::merkle::{AugBranch, AugMerkleTree, AugNode};
use crate::error::{PoolError, Result};
use crate::shares::Share;

/// The aggregate a pool puts on chain for one accounting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub num_shares: u64,
    /// Difficulty credited per share. The ledger pays `num_shares * difficulty`,
    /// so this is the lowest difficulty among the counted shares.
    pub difficulty: U256,
    pub min: U256,
    pub max: U256,
    pub aug_merkle: U256,
    pub created_at: DateTime<Utc>,
}

/// Response to a ledger challenge on one share of a submitted claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProof {
    pub rlp_header: Vec<u8>,
    pub nonce: U256,
    pub share_index: U256,
    pub dataset_lookup: Vec<U256>,
    pub witness_for_lookup: Vec<U256>,
    pub aug_counters_branch: Vec<U256>,
    pub aug_hashes_branch: Vec<U256>,
}

/// A claim together with the exact ordered shares it commits to. This is what
/// gets persisted, so a challenge can be answered later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub claim: Claim,
    pub shares: Vec<Share>,
}

impl ClaimRecord {
    /// Builds a claim over the shares whose difficulty lies in `[min, max]`.
    /// The input order does not matter; shares are sorted by counter and
    /// duplicates dropped before the tree is built.
    pub fn build(shares: Vec<Share>, min: U256, max: U256) -> Option<Self> {
        let mut shares: Vec<Share> = shares
            .into_iter()
            .filter(|s| s.share_difficulty() >= min && s.share_difficulty() <= max)
            .collect();
        shares.sort_by_key(|s| s.counter());
        shares.dedup_by_key(|s| s.counter());
        if shares.is_empty() {
            return None;
        }

        let tree = tree_for(&shares);
        let difficulty = shares
            .iter()
            .map(|s| s.share_difficulty())
            .min()
            .unwrap_or(min);

        let claim = Claim {
            id: Uuid::new_v4(),
            num_shares: shares.len() as u64,
            difficulty,
            min,
            max,
            aug_merkle: U256::from_big_endian(tree.root().hash.as_bytes()),
            created_at: Utc::now(),
        };

        Some(Self { claim, shares })
    }

    pub fn tree(&self) -> AugMerkleTree {
        tree_for(&self.shares)
    }

    /// Index of the share the ledger will check for a given claim seed.
    pub fn challenged_index(&self, seed: U256) -> usize {
        (seed % U256::from(self.claim.num_shares.max(1))).as_usize()
    }

    pub fn branch(&self, index: usize) -> Result<(&Share, AugBranch)> {
        let out_of_range = || PoolError::ShareIndexOutOfRange {
            index: U256::from(index),
            num_shares: self.claim.num_shares,
        };
        let share = self.shares.get(index).ok_or_else(out_of_range)?;
        let branch = self.tree().branch(index).ok_or_else(out_of_range)?;
        Ok((share, branch))
    }
}

pub fn leaf_for(share: &Share) -> AugNode {
    AugNode::leaf(share.counter(), share.digest())
}

fn tree_for(shares: &[Share]) -> AugMerkleTree {
    AugMerkleTree::build(shares.iter().map(leaf_for).collect())
}
