pub mod accounting;
pub mod types;
pub mod validator;

pub use accounting::ShareAccounting;
pub use types::{share_digest, BlockHeader, Share, Solution, SolutionState};
pub use validator::{network_target, EthashVerifier, PowHasher, PowOutput, PowVerifier};
