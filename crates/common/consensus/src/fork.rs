use alloy_primitives::aliases::B32;
use ember_network_spec::{ForkName, NetworkSpec};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

#[derive(
    Debug, PartialEq, Clone, Copy, Serialize, Deserialize, Encode, Decode, TreeHash, Eq, Default,
)]
pub struct Fork {
    pub previous_version: B32,
    pub current_version: B32,
    #[serde(with = "serde_utils::quoted_u64")]
    pub epoch: u64,
}

impl Fork {
    /// The `Fork` a state carries once `fork` has activated under `spec`.
    pub fn scheduled(spec: &NetworkSpec, fork: ForkName) -> Self {
        let scheduled = spec.fork_schedule().get(fork).to_owned();
        Self {
            previous_version: scheduled.previous_version,
            current_version: scheduled.current_version,
            epoch: scheduled.epoch,
        }
    }
}
