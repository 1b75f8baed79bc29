use chrono::{DateTime, Utc};
use ethereum_types::{H256, U256};

use crate::error::{PoolError, Result};
use crate::shares::{BlockHeader, PowVerifier, Share, Solution, SolutionState};

/// A piece of proof-of-work handed out to miners.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    id: String,
    header: BlockHeader,
    pow_hash: H256,
    seed_hash: H256,
    share_difficulty: U256,
    issued_at: DateTime<Utc>,
}

impl WorkUnit {
    pub fn new(
        id: impl Into<String>,
        header: BlockHeader,
        pow_hash: H256,
        seed_hash: H256,
        share_difficulty: U256,
    ) -> Result<Self> {
        if share_difficulty.is_zero() {
            return Err(PoolError::InvalidDifficulty(share_difficulty));
        }
        Ok(Self {
            id: id.into(),
            header,
            pow_hash,
            seed_hash,
            share_difficulty,
            issued_at: Utc::now(),
        })
    }

    /// Work keyed by its pow hash, which is what miners echo back on submission.
    pub fn from_pow_hash(
        header: BlockHeader,
        pow_hash: H256,
        seed_hash: H256,
        share_difficulty: U256,
    ) -> Result<Self> {
        let id = format!("{:#x}", pow_hash);
        Self::new(id, header, pow_hash, seed_hash, share_difficulty)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn pow_hash(&self) -> H256 {
        self.pow_hash
    }

    pub fn seed_hash(&self) -> H256 {
        self.seed_hash
    }

    pub fn share_difficulty(&self) -> U256 {
        self.share_difficulty
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn target(&self) -> U256 {
        share_target(self.share_difficulty)
    }

    pub fn accept_solution(&self, solution: &Solution, verifier: &dyn PowVerifier) -> Share {
        let share = Share::new(
            self.header.clone(),
            solution.nonce,
            solution.mix_digest,
            self.share_difficulty,
            SolutionState::Invalid,
        );
        let state = verifier.classify(&share, self.share_difficulty);
        share.with_state(state)
    }
}

/// (2^255 / difficulty) * 2. Miners and the verifier both expect this exact
/// rounding rather than 2^256 / difficulty. Saturates when difficulty is 1.
pub fn share_target(difficulty: U256) -> U256 {
    if difficulty.is_zero() {
        return U256::zero();
    }
    let half = (U256::one() << 255) / difficulty;
    half.checked_mul(U256::from(2u64))
        .unwrap_or_else(U256::max_value)
}
