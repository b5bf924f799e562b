use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// An eth1 block as voted on by proposers: the deposit contract root and count at that block.
#[derive(
    Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash, Hash, Default,
)]
pub struct Eth1Data {
    pub deposit_root: B256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub deposit_count: u64,
    pub block_hash: B256,
}

impl Eth1Data {
    /// Deposits the contract has seen that the beacon chain has not processed yet.
    pub fn pending_deposit_count(&self, eth1_deposit_index: u64) -> u64 {
        self.deposit_count.saturating_sub(eth1_deposit_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_deposits_never_underflow() {
        let eth1_data = Eth1Data {
            deposit_count: 10,
            ..Eth1Data::default()
        };
        assert_eq!(eth1_data.pending_deposit_count(4), 6);
        assert_eq!(eth1_data.pending_deposit_count(10), 0);
        assert_eq!(eth1_data.pending_deposit_count(12), 0);
    }
}
