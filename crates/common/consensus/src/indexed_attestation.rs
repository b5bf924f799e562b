use ember_bls::BLSSignature;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{VariableList, serde_utils::quoted_u64_var_list};
use tree_hash_derive::TreeHash;

use crate::{attestation_data::AttestationData, preset::Preset};

#[derive(
    Debug, PartialEq, Eq, Clone, Hash, Default, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
#[serde(bound = "")]
pub struct IndexedAttestation<P: Preset> {
    #[serde(with = "quoted_u64_var_list")]
    pub attesting_indices: VariableList<u64, P::MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub signature: BLSSignature,
}
