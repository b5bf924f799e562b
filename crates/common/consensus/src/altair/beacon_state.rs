use std::sync::Arc;

use alloy_primitives::B256;
use ember_persistent::{PersistentList, PersistentVector};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitVector, typenum::U4};
use tree_hash_derive::TreeHash;

use crate::{
    beacon_block_header::BeaconBlockHeader, checkpoint::Checkpoint, eth_1_data::Eth1Data,
    fork::Fork, preset::Preset, sync_committee::SyncCommittee, validator::Validator,
};

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "")]
pub struct BeaconState<P: Preset> {
    // Versioning
    #[serde(with = "serde_utils::quoted_u64")]
    pub genesis_time: u64,
    pub genesis_validators_root: B256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
    pub fork: Fork,

    // History
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: PersistentVector<B256, P::SlotsPerHistoricalRoot>,
    pub state_roots: PersistentVector<B256, P::SlotsPerHistoricalRoot>,
    pub historical_roots: PersistentList<B256, P::HistoricalRootsLimit>,

    // Eth1
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: PersistentList<Eth1Data, P::SlotsPerEth1VotingPeriod>,
    #[serde(with = "serde_utils::quoted_u64")]
    pub eth1_deposit_index: u64,

    // Registry
    pub validators: PersistentList<Validator, P::ValidatorRegistryLimit>,
    pub balances: PersistentList<u64, P::ValidatorRegistryLimit>,

    // Randomness
    pub randao_mixes: PersistentVector<B256, P::EpochsPerHistoricalVector>,

    // Slashings
    pub slashings: PersistentVector<u64, P::EpochsPerSlashingsVector>,

    // Participation
    pub previous_epoch_participation: PersistentList<u8, P::ValidatorRegistryLimit>,
    pub current_epoch_participation: PersistentList<u8, P::ValidatorRegistryLimit>,

    // Finality
    pub justification_bits: BitVector<U4>,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,

    // Inactivity
    pub inactivity_scores: PersistentList<u64, P::ValidatorRegistryLimit>,

    // Sync
    pub current_sync_committee: Arc<SyncCommittee<P>>,
    pub next_sync_committee: Arc<SyncCommittee<P>>,
}
