use std::sync::LazyLock;

use alloy_primitives::B256;

use crate::DEPOSIT_CONTRACT_TREE_DEPTH;

/// Common hashing function for Merkle trees.
pub(crate) fn hash_concat(h1: &[u8], h2: &[u8]) -> B256 {
    ethereum_hashing::hash32_concat(h1, h2).into()
}

/// `ZERO_HASHES[i]` is the root of a depth `i` tree of zero leaves.
pub(crate) static ZERO_HASHES: LazyLock<[B256; DEPOSIT_CONTRACT_TREE_DEPTH + 1]> =
    LazyLock::new(|| {
        let mut hashes = [B256::ZERO; DEPOSIT_CONTRACT_TREE_DEPTH + 1];
        for depth in 1..=DEPOSIT_CONTRACT_TREE_DEPTH {
            hashes[depth] = hash_concat(hashes[depth - 1].as_slice(), hashes[depth - 1].as_slice());
        }
        hashes
    });

/// Hashes `root` with the little-endian length chunk, as SSZ does for lists.
pub(crate) fn mix_in_length(root: B256, length: u64) -> B256 {
    hash_concat(root.as_slice(), length_chunk(length).as_slice())
}

pub(crate) fn length_chunk(length: u64) -> B256 {
    let mut chunk = B256::ZERO;
    chunk[..8].copy_from_slice(&length.to_le_bytes());
    chunk
}
