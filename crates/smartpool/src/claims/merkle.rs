use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// A Merkle node augmented with the counter range of the leaves below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugNode {
    pub min: U256,
    pub max: U256,
    pub hash: H256,
}

impl AugNode {
    pub fn leaf(counter: U256, hash: H256) -> Self {
        Self {
            min: counter,
            max: counter,
            hash,
        }
    }

    pub fn padding() -> Self {
        Self {
            min: U256::zero(),
            max: U256::zero(),
            hash: H256::zero(),
        }
    }

    pub fn is_padding(&self) -> bool {
        self.hash.is_zero() && self.min.is_zero() && self.max.is_zero()
    }

    pub fn combine(left: &AugNode, right: &AugNode) -> AugNode {
        if left.is_padding() && right.is_padding() {
            return AugNode::padding();
        }

        let mut hasher = Keccak256::new();
        for node in [left, right] {
            hasher.update(u256_bytes(node.min));
            hasher.update(u256_bytes(node.max));
            hasher.update(node.hash.as_bytes());
        }

        AugNode {
            min: left.min,
            max: if right.is_padding() { left.max } else { right.max },
            hash: H256::from_slice(&hasher.finalize()),
        }
    }
}

/// Sibling data from a leaf up to the root, in the layout the ledger takes:
/// `counters` holds `[min, max]` per level, `hashes` one entry per level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugBranch {
    pub counters: Vec<U256>,
    pub hashes: Vec<U256>,
}

impl AugBranch {
    pub fn depth(&self) -> usize {
        self.hashes.len()
    }
}

#[derive(Debug, Clone)]
pub struct AugMerkleTree {
    // levels[0] are the padded leaves, the last level is the root
    levels: Vec<Vec<AugNode>>,
    leaf_count: usize,
}

impl AugMerkleTree {
    /// Leaves must already be in canonical order.
    pub fn build(leaves: Vec<AugNode>) -> Self {
        let leaf_count = leaves.len();
        let width = leaf_count.max(1).next_power_of_two();

        let mut level = leaves;
        level.resize(width, AugNode::padding());

        let mut levels = vec![level];
        while levels.last().map_or(false, |l| l.len() > 1) {
            let next = levels
                .last()
                .map(|l| {
                    l.chunks(2)
                        .map(|pair| AugNode::combine(&pair[0], &pair[1]))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            levels.push(next);
        }

        Self { levels, leaf_count }
    }

    pub fn root(&self) -> AugNode {
        self.levels
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or_else(AugNode::padding)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn branch(&self, index: usize) -> Option<AugBranch> {
        if index >= self.leaf_count {
            return None;
        }

        let mut branch = AugBranch::default();
        let mut i = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = level[i ^ 1];
            branch.counters.push(sibling.min);
            branch.counters.push(sibling.max);
            branch.hashes.push(U256::from_big_endian(sibling.hash.as_bytes()));
            i /= 2;
        }
        Some(branch)
    }
}

/// Recomputes the root from a leaf and its branch. Also rejects any join where
/// the left subtree does not sort strictly before the right one.
pub fn verify_branch(leaf: AugNode, index: usize, branch: &AugBranch, root: H256) -> bool {
    if branch.counters.len() != branch.hashes.len() * 2 {
        return false;
    }
    if branch.depth() < usize::BITS as usize && index >> branch.depth() != 0 {
        return false;
    }

    let mut node = leaf;
    for (level, hash) in branch.hashes.iter().enumerate() {
        let sibling = AugNode {
            min: branch.counters[level * 2],
            max: branch.counters[level * 2 + 1],
            hash: H256::from(u256_bytes(*hash)),
        };
        let (left, right) = if (index >> level) & 1 == 0 {
            (node, sibling)
        } else {
            (sibling, node)
        };
        if !right.is_padding() && left.max >= right.min {
            return false;
        }
        node = AugNode::combine(&left, &right);
    }

    node.hash == root
}

pub(crate) fn u256_bytes(value: U256) -> [u8; 32] {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    buf
}
