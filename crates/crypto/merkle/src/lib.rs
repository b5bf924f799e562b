//! Merkle branch checks and the deposit contract tree.
//!
//! https://ethereum.github.io/consensus-specs/ssz/merkle-proofs

use alloy_primitives::B256;

mod deposit_tree;
mod hash;

pub use deposit_tree::DepositTree;
use hash::hash_concat;

/// Depth of the deposit contract's incremental Merkle tree.
pub const DEPOSIT_CONTRACT_TREE_DEPTH: usize = 32;

/// Checks that `leaf` sits at `index` under `root`, given its `depth` sibling hashes
/// ordered bottom-up.
pub fn is_valid_merkle_branch(
    leaf: B256,
    branch: &[B256],
    depth: u64,
    index: u64,
    root: B256,
) -> bool {
    if branch.len() < depth as usize {
        return false;
    }
    let mut value = leaf;
    for (height, sibling) in branch.iter().take(depth as usize).enumerate() {
        value = if (index >> height) & 1 == 1 {
            hash_concat(sibling.as_slice(), value.as_slice())
        } else {
            hash_concat(value.as_slice(), sibling.as_slice())
        };
    }
    value == root
}
