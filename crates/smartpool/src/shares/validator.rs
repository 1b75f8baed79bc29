use ethereum_types::{H256, H64, U256};
use tracing::debug;

use super::types::{BlockHeader, Share, SolutionState};
use crate::work::share_target;

/// Classifies a share against the pool's share difficulty and the network
/// difficulty carried in its header.
pub trait PowVerifier: Send + Sync {
    fn classify(&self, share: &Share, share_difficulty: U256) -> SolutionState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowOutput {
    pub mix_digest: H256,
    pub result: H256,
}

/// The ethash dataset hash. Supplied by whoever owns the DAG.
pub trait PowHasher: Send + Sync {
    fn compute(&self, header: &BlockHeader, nonce: H64) -> PowOutput;
}

pub struct EthashVerifier<H> {
    hasher: H,
}

impl<H: PowHasher> EthashVerifier<H> {
    pub fn new(hasher: H) -> Self {
        Self { hasher }
    }
}

impl<H: PowHasher> PowVerifier for EthashVerifier<H> {
    fn classify(&self, share: &Share, share_difficulty: U256) -> SolutionState {
        if share_difficulty.is_zero() {
            return SolutionState::Invalid;
        }

        let output = self.hasher.compute(share.header(), share.nonce());
        if output.mix_digest != share.mix_digest() {
            debug!(
                "Mix digest mismatch for nonce {:#x}: got {:#x}, computed {:#x}",
                share.nonce(),
                share.mix_digest(),
                output.mix_digest
            );
            return SolutionState::Invalid;
        }

        let result = U256::from_big_endian(output.result.as_bytes());
        if result > share_target(share_difficulty) {
            return SolutionState::Invalid;
        }
        if result <= network_target(share.header().difficulty) {
            return SolutionState::FullBlockSolution;
        }
        SolutionState::ValidShare
    }
}

/// floor(2^256 / difficulty), the boundary a block hash must not exceed.
pub fn network_target(difficulty: U256) -> U256 {
    if difficulty <= U256::one() {
        return U256::max_value();
    }
    // 2^256 = MAX + 1 = q * d + r + 1
    let q = U256::max_value() / difficulty;
    let r = U256::max_value() % difficulty;
    if r + U256::one() == difficulty {
        q + U256::one()
    } else {
        q
    }
}
