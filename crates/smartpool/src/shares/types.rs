use chrono::{DateTime, Utc};
use ethereum_types::{H256, H64, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Outcome of checking a share against the share target and the network target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SolutionState {
    Invalid = 0,
    ValidShare = 1,
    FullBlockSolution = 2,
}

impl SolutionState {
    pub fn is_accepted(self) -> bool {
        self >= SolutionState::ValidShare
    }
}

/// The parts of a block header the pool needs. `rlp` is the sealed header
/// without mix digest and nonce, so its keccak is the PoW hash; the ledger
/// re-derives everything else from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub timestamp: u64,
    pub difficulty: U256,
    #[serde(with = "hex_bytes")]
    pub rlp: Vec<u8>,
}

impl BlockHeader {
    pub fn epoch(&self) -> u64 {
        self.number / crate::claims::EPOCH_LENGTH
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub work_id: String,
    pub nonce: H64,
    pub hash: H256,
    pub mix_digest: H256,
}

impl Solution {
    /// Builds a solution as miners submit it: the work is identified by its pow hash.
    pub fn new(nonce: H64, hash: H256, mix_digest: H256) -> Self {
        Self {
            work_id: format!("{:#x}", hash),
            nonce,
            hash,
            mix_digest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    header: BlockHeader,
    nonce: H64,
    mix_digest: H256,
    share_difficulty: U256,
    state: SolutionState,
    accepted_at: DateTime<Utc>,
}

impl Share {
    pub(crate) fn new(
        header: BlockHeader,
        nonce: H64,
        mix_digest: H256,
        share_difficulty: U256,
        state: SolutionState,
    ) -> Self {
        Self {
            header,
            nonce,
            mix_digest,
            share_difficulty,
            state,
            accepted_at: Utc::now(),
        }
    }

    pub(crate) fn with_state(mut self, state: SolutionState) -> Self {
        self.state = state;
        self
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn nonce(&self) -> H64 {
        self.nonce
    }

    pub fn mix_digest(&self) -> H256 {
        self.mix_digest
    }

    pub fn share_difficulty(&self) -> U256 {
        self.share_difficulty
    }

    pub fn state(&self) -> SolutionState {
        self.state
    }

    pub fn accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at
    }

    pub fn is_accepted(&self) -> bool {
        self.state.is_accepted()
    }

    /// keccak256(rlp header ‖ nonce). Uniquely names the share and is what the
    /// ledger recomputes from a claim verification.
    pub fn digest(&self) -> H256 {
        share_digest(&self.header.rlp, self.nonce)
    }

    /// Position of the share in the canonical claim ordering.
    pub fn counter(&self) -> U256 {
        U256::from_big_endian(self.digest().as_bytes())
    }
}

pub fn share_digest(rlp_header: &[u8], nonce: H64) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(rlp_header);
    hasher.update(nonce.as_bytes());
    H256::from_slice(&hasher.finalize())
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
