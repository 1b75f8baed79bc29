use ethereum_types::U256;
use serde::{Deserialize, Serialize};

use super::claim::{ClaimProof, ClaimRecord};
use crate::error::Result;
use crate::shares::Share;

/// Blocks per ethash dataset epoch.
pub const EPOCH_LENGTH: u64 = 30_000;

/// Dataset elements touched while hashing a share, plus their Merkle witness
/// against the epoch root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLookup {
    pub lookup: Vec<U256>,
    pub witness: Vec<U256>,
}

/// Per-epoch dataset commitments, in the batched form the ledger accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochData {
    pub merkle_roots: Vec<U256>,
    pub full_size_in_128_resolution: Vec<u64>,
    pub branch_depth: Vec<u64>,
    pub epochs: Vec<U256>,
}

impl EpochData {
    pub fn single(
        epoch: u64,
        merkle_root: U256,
        full_size_in_128_resolution: u64,
        branch_depth: u64,
    ) -> Self {
        Self {
            merkle_roots: vec![merkle_root],
            full_size_in_128_resolution: vec![full_size_in_128_resolution],
            branch_depth: vec![branch_depth],
            epochs: vec![U256::from(epoch)],
        }
    }
}

/// Access to the ethash dataset and its Merkle commitment.
pub trait DatasetProver: Send + Sync {
    fn lookup(&self, share: &Share) -> Result<DatasetLookup>;
    fn epoch_data(&self, epoch: u64) -> Result<EpochData>;
}

/// Everything the ledger needs to re-check share `index` of a claim.
pub fn build_proof(
    record: &ClaimRecord,
    index: usize,
    prover: &dyn DatasetProver,
) -> Result<ClaimProof> {
    let (share, branch) = record.branch(index)?;
    let lookup = prover.lookup(share)?;

    Ok(ClaimProof {
        rlp_header: share.header().rlp.clone(),
        nonce: U256::from_big_endian(share.nonce().as_bytes()),
        share_index: U256::from(index),
        dataset_lookup: lookup.lookup,
        witness_for_lookup: lookup.witness,
        aug_counters_branch: branch.counters,
        aug_hashes_branch: branch.hashes,
    })
}
