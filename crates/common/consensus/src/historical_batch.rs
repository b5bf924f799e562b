use alloy_primitives::B256;
use ember_persistent::PersistentVector;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::preset::Preset;

/// Holds clones of the state's root vectors, so building one costs two pointer copies.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "")]
pub struct HistoricalBatch<P: Preset> {
    pub block_roots: PersistentVector<B256, P::SlotsPerHistoricalRoot>,
    pub state_roots: PersistentVector<B256, P::SlotsPerHistoricalRoot>,
}
