use alloy_primitives::B256;
use ember_merkle::{DEPOSIT_CONTRACT_TREE_DEPTH, is_valid_merkle_branch};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{FixedVector, typenum::U33};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::deposit_data::DepositData;

#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Deposit {
    /// Branch from the deposit data leaf to the length-mixed deposit root
    pub proof: FixedVector<B256, U33>,
    pub data: DepositData,
}

impl Deposit {
    /// Checks `proof` against `deposit_root` for the leaf at `deposit_index`. The extra level
    /// above the contract tree depth is the mixed in deposit count.
    pub fn is_valid_proof(&self, deposit_root: B256, deposit_index: u64) -> bool {
        is_valid_merkle_branch(
            self.data.tree_hash_root(),
            &self.proof,
            DEPOSIT_CONTRACT_TREE_DEPTH as u64 + 1,
            deposit_index,
            deposit_root,
        )
    }
}
