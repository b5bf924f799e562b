use std::sync::LazyLock;

use alloy_primitives::B256;
use ethereum_hashing::hash32_concat;

const MAX_ZERO_HASH_DEPTH: usize = 64;

static ZERO_HASHES: LazyLock<Vec<B256>> = LazyLock::new(|| {
    let mut hashes = vec![B256::ZERO; MAX_ZERO_HASH_DEPTH + 1];
    for depth in 1..=MAX_ZERO_HASH_DEPTH {
        hashes[depth] = B256::from(hash32_concat(
            hashes[depth - 1].as_slice(),
            hashes[depth - 1].as_slice(),
        ));
    }
    hashes
});

/// Root of a subtree of `2^depth` zero chunks.
pub(crate) fn zero_hash(depth: u32) -> B256 {
    ZERO_HASHES
        .get(depth as usize)
        .copied()
        .unwrap_or(ZERO_HASHES[MAX_ZERO_HASH_DEPTH])
}

pub(crate) fn hash_pair(left: &B256, right: &B256) -> B256 {
    B256::from(hash32_concat(left.as_slice(), right.as_slice()))
}
