use std::cmp::max;

use alloy_primitives::{B256, aliases::B32};
use anyhow::{anyhow, ensure};
use ethereum_hashing::hash;
use tree_hash::TreeHash;

use crate::{
    constants::MAX_SEED_LOOKAHEAD, fork_data::ForkData, preset::Preset,
    signing_data::SigningData,
};

pub mod checksummed_address {
    use alloy_primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S>(address: &Address, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&address.to_checksum(None))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Address, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse::<Address>().map_err(D::Error::custom)
    }
}

pub fn compute_signing_root<SSZObject: TreeHash>(ssz_object: SSZObject, domain: B256) -> B256 {
    SigningData {
        object_root: ssz_object.tree_hash_root(),
        domain,
    }
    .tree_hash_root()
}

/// Return the shuffled index corresponding to ``seed`` (and ``index_count``).
pub fn compute_shuffled_index<P: Preset>(
    mut index: usize,
    index_count: usize,
    seed: B256,
) -> anyhow::Result<usize> {
    ensure!(index < index_count, "Index must be less than index_count");
    for round in 0..P::SHUFFLE_ROUND_COUNT {
        let seed_with_round = [seed.as_slice(), &round.to_le_bytes()].concat();
        let pivot = bytes_to_int64(&hash(&seed_with_round)[..]) % index_count as u64;

        let flip = (pivot as usize + (index_count - index)) % index_count;
        let position = max(index, flip);
        let seed_with_position = [
            seed_with_round.as_slice(),
            &(position / 256).to_le_bytes()[0..4],
        ]
        .concat();
        let source = hash(&seed_with_position);
        let byte = source[(position % 256) / 8];
        let bit = (byte >> (position % 8)) % 2;

        index = if bit == 1 { flip } else { index };
    }
    Ok(index)
}

// Return the integer deserialization of ``data`` interpreted as ``ENDIANNESS``-endian.
pub fn bytes_to_int64(slice: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    let len = slice.len().min(8);
    bytes[..len].copy_from_slice(&slice[..len]);
    u64::from_le_bytes(bytes)
}

/// Return the committee corresponding to ``indices``, ``seed``, ``index``, and committee ``count``.
pub fn compute_committee<P: Preset>(
    indices: &[u64],
    seed: B256,
    index: u64,
    count: u64,
) -> anyhow::Result<Vec<u64>> {
    ensure!(count > 0, "Committee count must be positive");
    let start = (indices.len() as u64 * index) / count;
    let end = (indices.len() as u64 * (index + 1)) / count;
    (start..end)
        .map(|i| {
            let shuffled_index = compute_shuffled_index::<P>(i as usize, indices.len(), seed)?;
            indices
                .get(shuffled_index)
                .copied()
                .ok_or_else(|| anyhow!("Index out of bounds: {shuffled_index}"))
        })
        .collect()
}

/// Return the epoch number at ``slot``.
pub fn compute_epoch_at_slot<P: Preset>(slot: u64) -> u64 {
    slot / P::SLOTS_PER_EPOCH
}

/// Return the start slot of ``epoch``.
pub fn compute_start_slot_at_epoch<P: Preset>(epoch: u64) -> u64 {
    epoch * P::SLOTS_PER_EPOCH
}

/// Return the epoch during which validator activations and exits initiated in ``epoch`` take
/// effect.
pub fn compute_activation_exit_epoch(epoch: u64) -> u64 {
    epoch + 1 + MAX_SEED_LOOKAHEAD
}

/// Return the domain for the ``domain_type`` and ``fork_version``.
pub fn compute_domain(
    domain_type: B32,
    fork_version: B32,
    genesis_validators_root: B256,
) -> B256 {
    let fork_data = ForkData {
        current_version: fork_version,
        genesis_validators_root,
    };
    let fork_data_root = fork_data.compute_fork_data_root();
    let domain_bytes = [&domain_type.0, &fork_data_root.0[..28]].concat();
    B256::from_slice(&domain_bytes)
}

pub fn is_sorted_and_unique(indices: &[u64]) -> bool {
    indices.windows(2).all(|w| w[0] < w[1])
}

pub fn compute_sync_committee_period<P: Preset>(epoch: u64) -> u64 {
    epoch / P::EPOCHS_PER_SYNC_COMMITTEE_PERIOD
}

/// Return the largest integer ``x`` such that ``x**2 <= n``.
pub fn integer_squareroot(n: u64) -> u64 {
    if n == u64::MAX {
        return crate::constants::UINT64_MAX_SQRT;
    }
    let mut x = n;
    let mut y = x.div_ceil(2);
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

pub fn xor<T: AsRef<[u8]>>(bytes_1: T, bytes_2: T) -> B256 {
    let mut result = B256::default();
    for (i, (a, b)) in bytes_1.as_ref().iter().zip(bytes_2.as_ref()).take(32).enumerate() {
        result[i] = a ^ b;
    }
    result
}

#[cfg(test)]
mod tests {
    use alloy_primitives::hex::FromHex;
    use rstest::rstest;

    use super::*;
    use crate::preset::{Mainnet, Minimal};

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(15, 3)]
    #[case(16, 4)]
    #[case(1 << 40, 1 << 20)]
    #[case(u64::MAX, 4294967295)]
    fn squareroot(#[case] n: u64, #[case] expected: u64) {
        assert_eq!(integer_squareroot(n), expected);
    }

    #[test]
    fn shuffled_index_is_a_permutation() {
        let seed = B256::repeat_byte(0x42);
        let count = 100;
        let mut shuffled: Vec<usize> = (0..count)
            .map(|index| compute_shuffled_index::<Minimal>(index, count, seed).expect("in range"))
            .collect();
        assert_ne!(shuffled, (0..count).collect::<Vec<_>>());
        shuffled.sort_unstable();
        assert_eq!(shuffled, (0..count).collect::<Vec<_>>());
    }

    #[test]
    fn shuffled_index_depends_on_round_count() {
        let seed = B256::repeat_byte(3);
        let differs = (0..64).any(|index| {
            compute_shuffled_index::<Minimal>(index, 64, seed).ok()
                != compute_shuffled_index::<Mainnet>(index, 64, seed).ok()
        });
        assert!(differs);
        assert!(compute_shuffled_index::<Minimal>(64, 64, seed).is_err());
    }

    #[test]
    fn committees_partition_the_indices() {
        let indices: Vec<u64> = (100..164).collect();
        let seed = B256::repeat_byte(9);
        let mut members: Vec<u64> = (0..4)
            .flat_map(|index| {
                compute_committee::<Minimal>(&indices, seed, index, 4).expect("valid committee")
            })
            .collect();
        members.sort_unstable();
        assert_eq!(members, indices);
    }

    #[test]
    fn domain_prefixes_type_and_fork_data_root() {
        let domain = compute_domain(
            B32::from_hex("0x01000000").expect("hex"),
            B32::ZERO,
            B256::ZERO,
        );
        let fork_data_root = ForkData {
            current_version: B32::ZERO,
            genesis_validators_root: B256::ZERO,
        }
        .compute_fork_data_root();
        assert_eq!(&domain[..4], &[1, 0, 0, 0]);
        assert_eq!(&domain[4..], &fork_data_root[..28]);
    }

    #[rstest]
    #[case(&[], true)]
    #[case(&[1], true)]
    #[case(&[1, 2, 5], true)]
    #[case(&[1, 1], false)]
    #[case(&[3, 2], false)]
    fn sorted_and_unique(#[case] indices: &[u64], #[case] expected: bool) {
        assert_eq!(is_sorted_and_unique(indices), expected);
    }
}
