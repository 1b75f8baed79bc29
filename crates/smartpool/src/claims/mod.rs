pub mod challenge;
pub mod claim;
pub mod merkle;
pub mod protocol;

pub use challenge::{build_proof, DatasetLookup, DatasetProver, EpochData, EPOCH_LENGTH};
pub use claim::{leaf_for, Claim, ClaimProof, ClaimRecord};
pub use merkle::{verify_branch, AugBranch, AugMerkleTree, AugNode};
pub use protocol::ClaimProtocol;
