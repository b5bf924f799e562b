use alloy_primitives::B256;
use anyhow::ensure;

use crate::{
    DEPOSIT_CONTRACT_TREE_DEPTH,
    hash::{ZERO_HASHES, hash_concat, length_chunk, mix_in_length},
};

/// Leaves of the deposit contract tree, with the roots and branches the contract would
/// report after each deposit.
///
/// The root is length-mixed, so a branch against it has `DEPOSIT_CONTRACT_TREE_DEPTH + 1`
/// entries with the deposit count as the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositTree {
    leaves: Vec<B256>,
}

impl DepositTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_leaves(leaves: Vec<B256>) -> anyhow::Result<Self> {
        ensure!(
            leaves.len() < 1 << DEPOSIT_CONTRACT_TREE_DEPTH,
            "Deposit tree is full"
        );
        Ok(Self { leaves })
    }

    pub fn push_leaf(&mut self, leaf: B256) -> anyhow::Result<()> {
        ensure!(
            self.leaves.len() + 1 < 1 << DEPOSIT_CONTRACT_TREE_DEPTH,
            "Deposit tree is full"
        );
        self.leaves.push(leaf);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// `deposit_root` as it appears in `Eth1Data`.
    pub fn root(&self) -> B256 {
        let mut layer = self.leaves.clone();
        for depth in 0..DEPOSIT_CONTRACT_TREE_DEPTH {
            layer = next_layer(&layer, depth);
        }
        let root = layer.first().copied().unwrap_or(ZERO_HASHES[DEPOSIT_CONTRACT_TREE_DEPTH]);
        mix_in_length(root, self.leaves.len() as u64)
    }

    /// Branch proving the leaf at `index` against [`Self::root`].
    pub fn proof(&self, index: usize) -> anyhow::Result<Vec<B256>> {
        ensure!(
            index < self.leaves.len(),
            "Deposit index {index} is out of bounds for {} deposits",
            self.leaves.len()
        );

        let mut proof = Vec::with_capacity(DEPOSIT_CONTRACT_TREE_DEPTH + 1);
        let mut layer = self.leaves.clone();
        let mut position = index;
        for depth in 0..DEPOSIT_CONTRACT_TREE_DEPTH {
            proof.push(
                layer
                    .get(position ^ 1)
                    .copied()
                    .unwrap_or(ZERO_HASHES[depth]),
            );
            layer = next_layer(&layer, depth);
            position /= 2;
        }
        proof.push(length_chunk(self.leaves.len() as u64));
        Ok(proof)
    }
}

fn next_layer(layer: &[B256], depth: usize) -> Vec<B256> {
    layer
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_concat(left.as_slice(), right.as_slice()),
            [left] => hash_concat(left.as_slice(), ZERO_HASHES[depth].as_slice()),
            _ => ZERO_HASHES[depth + 1],
        })
        .collect()
}
