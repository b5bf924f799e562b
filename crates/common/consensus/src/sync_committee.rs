use ember_bls::{BLSSignature, PubKey};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitVector, FixedVector};
use tree_hash_derive::TreeHash;

use crate::preset::Preset;

#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "")]
pub struct SyncCommittee<P: Preset> {
    pub pubkeys: FixedVector<PubKey, P::SyncCommitteeSize>,
    pub aggregate_pubkey: PubKey,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "")]
pub struct SyncAggregate<P: Preset> {
    pub sync_committee_bits: BitVector<P::SyncCommitteeSize>,
    pub sync_committee_signature: BLSSignature,
}

impl<P: Preset> Default for SyncAggregate<P> {
    /// An aggregate with no participants, signed with the point at infinity.
    fn default() -> Self {
        Self {
            sync_committee_bits: BitVector::new(),
            sync_committee_signature: BLSSignature::infinity(),
        }
    }
}
