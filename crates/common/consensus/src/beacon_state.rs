use alloy_primitives::B256;
use anyhow::{anyhow, ensure};
use ember_network_spec::{ForkName, NetworkSpec};
use ember_persistent::{PersistentList, PersistentVector};
use serde::{Deserialize, Serialize};
use ssz::{Decode, Encode};
use ssz_types::{BitVector, typenum::U4};
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

use crate::{
    altair, bellatrix,
    beacon_block_header::BeaconBlockHeader,
    checkpoint::Checkpoint,
    eth_1_data::Eth1Data,
    fork::Fork,
    misc::compute_epoch_at_slot,
    phase0,
    preset::Preset,
    validator::Validator,
    view::BeaconStateView,
};

/// Byte offset of `slot` in every fork's SSZ encoding: `genesis_time` then
/// `genesis_validators_root` precede it.
pub const STATE_SLOT_OFFSET: usize = 40;

/// A beacon state of any supported fork.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(bound = "", tag = "version", content = "data", rename_all = "lowercase")]
pub enum BeaconState<P: Preset> {
    Phase0(phase0::beacon_state::BeaconState<P>),
    Altair(altair::beacon_state::BeaconState<P>),
    Bellatrix(bellatrix::beacon_state::BeaconState<P>),
}

/// Runs `$body` against the inner per-fork state bound to `$state`.
#[macro_export]
macro_rules! fork_dispatch {
    ($value:expr, $state:ident => $body:expr) => {
        match $value {
            $crate::beacon_state::BeaconState::Phase0($state) => $body,
            $crate::beacon_state::BeaconState::Altair($state) => $body,
            $crate::beacon_state::BeaconState::Bellatrix($state) => $body,
        }
    };
}

impl<P: Preset> BeaconState<P> {
    /// Decodes a state, picking the fork that the schedule assigns to its slot.
    pub fn from_ssz_bytes(bytes: &[u8], spec: &NetworkSpec) -> anyhow::Result<Self> {
        let slot_bytes = bytes
            .get(STATE_SLOT_OFFSET..STATE_SLOT_OFFSET + 8)
            .ok_or_else(|| anyhow!("State is too short to hold a slot: {} bytes", bytes.len()))?;
        let slot = u64::from_ssz_bytes(slot_bytes)
            .map_err(|err| anyhow!("Failed to decode state slot: {err:?}"))?;
        let fork_name = spec.fork_at_epoch(compute_epoch_at_slot::<P>(slot));

        let state = match fork_name {
            ForkName::Phase0 => Self::Phase0(
                phase0::beacon_state::BeaconState::from_ssz_bytes(bytes)
                    .map_err(|err| anyhow!("Failed to decode phase0 state: {err:?}"))?,
            ),
            ForkName::Altair => Self::Altair(
                altair::beacon_state::BeaconState::from_ssz_bytes(bytes)
                    .map_err(|err| anyhow!("Failed to decode altair state: {err:?}"))?,
            ),
            ForkName::Bellatrix => Self::Bellatrix(
                bellatrix::beacon_state::BeaconState::from_ssz_bytes(bytes)
                    .map_err(|err| anyhow!("Failed to decode bellatrix state: {err:?}"))?,
            ),
        };
        state.check_registry_lengths()?;
        Ok(state)
    }

    /// Every per-validator list must be exactly as long as the registry.
    fn check_registry_lengths(&self) -> anyhow::Result<()> {
        let validators = self.validators().len();
        let mut lengths = vec![("balances", self.balances().len())];
        let participation = match self {
            Self::Phase0(_) => None,
            Self::Altair(state) => Some([
                state.previous_epoch_participation.len(),
                state.current_epoch_participation.len(),
                state.inactivity_scores.len(),
            ]),
            Self::Bellatrix(state) => Some([
                state.previous_epoch_participation.len(),
                state.current_epoch_participation.len(),
                state.inactivity_scores.len(),
            ]),
        };
        if let Some([previous, current, scores]) = participation {
            lengths.extend([
                ("previous_epoch_participation", previous),
                ("current_epoch_participation", current),
                ("inactivity_scores", scores),
            ]);
        }
        for (name, len) in lengths {
            ensure!(
                len == validators,
                "State has {len} {name} entries for {validators} validators"
            );
        }
        Ok(())
    }

    pub fn as_phase0(&self) -> Option<&phase0::beacon_state::BeaconState<P>> {
        match self {
            Self::Phase0(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_altair(&self) -> Option<&altair::beacon_state::BeaconState<P>> {
        match self {
            Self::Altair(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_bellatrix(&self) -> Option<&bellatrix::beacon_state::BeaconState<P>> {
        match self {
            Self::Bellatrix(state) => Some(state),
            _ => None,
        }
    }
}

impl<P: Preset> From<phase0::beacon_state::BeaconState<P>> for BeaconState<P> {
    fn from(state: phase0::beacon_state::BeaconState<P>) -> Self {
        Self::Phase0(state)
    }
}

impl<P: Preset> From<altair::beacon_state::BeaconState<P>> for BeaconState<P> {
    fn from(state: altair::beacon_state::BeaconState<P>) -> Self {
        Self::Altair(state)
    }
}

impl<P: Preset> From<bellatrix::beacon_state::BeaconState<P>> for BeaconState<P> {
    fn from(state: bellatrix::beacon_state::BeaconState<P>) -> Self {
        Self::Bellatrix(state)
    }
}

impl<P: Preset> Encode for BeaconState<P> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        fork_dispatch!(self, state => state.ssz_append(buf))
    }

    fn ssz_bytes_len(&self) -> usize {
        fork_dispatch!(self, state => state.ssz_bytes_len())
    }
}

impl<P: Preset> TreeHash for BeaconState<P> {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Container
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("Container should never be packed.")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("Container should never be packed.")
    }

    fn tree_hash_root(&self) -> B256 {
        fork_dispatch!(self, state => state.tree_hash_root())
    }
}

impl<P: Preset> BeaconStateView<P> for BeaconState<P> {
    fn fork_name(&self) -> ForkName {
        match self {
            Self::Phase0(_) => ForkName::Phase0,
            Self::Altair(_) => ForkName::Altair,
            Self::Bellatrix(_) => ForkName::Bellatrix,
        }
    }

    fn genesis_time(&self) -> u64 {
        fork_dispatch!(self, state => state.genesis_time)
    }

    fn genesis_validators_root(&self) -> B256 {
        fork_dispatch!(self, state => state.genesis_validators_root)
    }

    fn slot(&self) -> u64 {
        fork_dispatch!(self, state => state.slot)
    }

    fn slot_mut(&mut self) -> &mut u64 {
        fork_dispatch!(self, state => &mut state.slot)
    }

    fn fork(&self) -> &Fork {
        fork_dispatch!(self, state => &state.fork)
    }

    fn fork_mut(&mut self) -> &mut Fork {
        fork_dispatch!(self, state => &mut state.fork)
    }

    fn latest_block_header(&self) -> &BeaconBlockHeader {
        fork_dispatch!(self, state => &state.latest_block_header)
    }

    fn latest_block_header_mut(&mut self) -> &mut BeaconBlockHeader {
        fork_dispatch!(self, state => &mut state.latest_block_header)
    }

    fn block_roots(&self) -> &PersistentVector<B256, P::SlotsPerHistoricalRoot> {
        fork_dispatch!(self, state => &state.block_roots)
    }

    fn block_roots_mut(&mut self) -> &mut PersistentVector<B256, P::SlotsPerHistoricalRoot> {
        fork_dispatch!(self, state => &mut state.block_roots)
    }

    fn state_roots(&self) -> &PersistentVector<B256, P::SlotsPerHistoricalRoot> {
        fork_dispatch!(self, state => &state.state_roots)
    }

    fn state_roots_mut(&mut self) -> &mut PersistentVector<B256, P::SlotsPerHistoricalRoot> {
        fork_dispatch!(self, state => &mut state.state_roots)
    }

    fn historical_roots(&self) -> &PersistentList<B256, P::HistoricalRootsLimit> {
        fork_dispatch!(self, state => &state.historical_roots)
    }

    fn historical_roots_mut(&mut self) -> &mut PersistentList<B256, P::HistoricalRootsLimit> {
        fork_dispatch!(self, state => &mut state.historical_roots)
    }

    fn eth1_data(&self) -> &Eth1Data {
        fork_dispatch!(self, state => &state.eth1_data)
    }

    fn eth1_data_mut(&mut self) -> &mut Eth1Data {
        fork_dispatch!(self, state => &mut state.eth1_data)
    }

    fn eth1_data_votes(&self) -> &PersistentList<Eth1Data, P::SlotsPerEth1VotingPeriod> {
        fork_dispatch!(self, state => &state.eth1_data_votes)
    }

    fn eth1_data_votes_mut(
        &mut self,
    ) -> &mut PersistentList<Eth1Data, P::SlotsPerEth1VotingPeriod> {
        fork_dispatch!(self, state => &mut state.eth1_data_votes)
    }

    fn eth1_deposit_index(&self) -> u64 {
        fork_dispatch!(self, state => state.eth1_deposit_index)
    }

    fn eth1_deposit_index_mut(&mut self) -> &mut u64 {
        fork_dispatch!(self, state => &mut state.eth1_deposit_index)
    }

    fn validators(&self) -> &PersistentList<Validator, P::ValidatorRegistryLimit> {
        fork_dispatch!(self, state => &state.validators)
    }

    fn validators_mut(&mut self) -> &mut PersistentList<Validator, P::ValidatorRegistryLimit> {
        fork_dispatch!(self, state => &mut state.validators)
    }

    fn balances(&self) -> &PersistentList<u64, P::ValidatorRegistryLimit> {
        fork_dispatch!(self, state => &state.balances)
    }

    fn balances_mut(&mut self) -> &mut PersistentList<u64, P::ValidatorRegistryLimit> {
        fork_dispatch!(self, state => &mut state.balances)
    }

    fn randao_mixes(&self) -> &PersistentVector<B256, P::EpochsPerHistoricalVector> {
        fork_dispatch!(self, state => &state.randao_mixes)
    }

    fn randao_mixes_mut(&mut self) -> &mut PersistentVector<B256, P::EpochsPerHistoricalVector> {
        fork_dispatch!(self, state => &mut state.randao_mixes)
    }

    fn slashings(&self) -> &PersistentVector<u64, P::EpochsPerSlashingsVector> {
        fork_dispatch!(self, state => &state.slashings)
    }

    fn slashings_mut(&mut self) -> &mut PersistentVector<u64, P::EpochsPerSlashingsVector> {
        fork_dispatch!(self, state => &mut state.slashings)
    }

    fn justification_bits(&self) -> &BitVector<U4> {
        fork_dispatch!(self, state => &state.justification_bits)
    }

    fn justification_bits_mut(&mut self) -> &mut BitVector<U4> {
        fork_dispatch!(self, state => &mut state.justification_bits)
    }

    fn previous_justified_checkpoint(&self) -> Checkpoint {
        fork_dispatch!(self, state => state.previous_justified_checkpoint)
    }

    fn previous_justified_checkpoint_mut(&mut self) -> &mut Checkpoint {
        fork_dispatch!(self, state => &mut state.previous_justified_checkpoint)
    }

    fn current_justified_checkpoint(&self) -> Checkpoint {
        fork_dispatch!(self, state => state.current_justified_checkpoint)
    }

    fn current_justified_checkpoint_mut(&mut self) -> &mut Checkpoint {
        fork_dispatch!(self, state => &mut state.current_justified_checkpoint)
    }

    fn finalized_checkpoint(&self) -> Checkpoint {
        fork_dispatch!(self, state => state.finalized_checkpoint)
    }

    fn finalized_checkpoint_mut(&mut self) -> &mut Checkpoint {
        fork_dispatch!(self, state => &mut state.finalized_checkpoint)
    }

    fn push_validator(&mut self, validator: Validator, balance: u64) -> anyhow::Result<()> {
        fork_dispatch!(self, state => state.push_validator(validator, balance))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ember_bls::PrivateKey;
    use ember_network_spec::MINIMAL;

    use super::*;
    use crate::{
        constants::{EFFECTIVE_BALANCE_INCREMENT, MAX_EFFECTIVE_BALANCE},
        preset::Minimal,
        sync_committee::SyncCommittee,
        view::PostAltairBeaconState,
    };

    fn validator(index: u8) -> Validator {
        Validator {
            pubkey: PrivateKey::key_gen(&[index; 32])
                .and_then(|key| key.public_key())
                .expect("valid key material"),
            withdrawal_credentials: B256::repeat_byte(index),
            effective_balance: MAX_EFFECTIVE_BALANCE,
            slashed: false,
            activation_eligibility_epoch: 0,
            activation_epoch: 0,
            exit_epoch: u64::MAX,
            withdrawable_epoch: u64::MAX,
        }
    }

    fn phase0_state(validator_count: u8, slot: u64) -> phase0::beacon_state::BeaconState<Minimal> {
        let mut state = phase0::beacon_state::BeaconState::<Minimal> {
            genesis_time: 1_600_000_000,
            genesis_validators_root: B256::repeat_byte(0xaa),
            slot,
            fork: Fork::default(),
            latest_block_header: BeaconBlockHeader::default(),
            block_roots: PersistentVector::default(),
            state_roots: PersistentVector::default(),
            historical_roots: PersistentList::default(),
            eth1_data: Eth1Data::default(),
            eth1_data_votes: PersistentList::default(),
            eth1_deposit_index: 0,
            validators: PersistentList::default(),
            balances: PersistentList::default(),
            randao_mixes: PersistentVector::repeat(B256::repeat_byte(0x42)),
            slashings: PersistentVector::default(),
            previous_epoch_attestations: PersistentList::default(),
            current_epoch_attestations: PersistentList::default(),
            justification_bits: BitVector::new(),
            previous_justified_checkpoint: Checkpoint::default(),
            current_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
        };
        for index in 0..validator_count {
            state
                .push_validator(validator(index), MAX_EFFECTIVE_BALANCE)
                .expect("registry has room");
        }
        state
    }

    fn altair_state(validator_count: u8, slot: u64) -> altair::beacon_state::BeaconState<Minimal> {
        let phase0 = phase0_state(0, slot);
        let mut state = altair::beacon_state::BeaconState::<Minimal> {
            genesis_time: phase0.genesis_time,
            genesis_validators_root: phase0.genesis_validators_root,
            slot,
            fork: Fork::default(),
            latest_block_header: phase0.latest_block_header,
            block_roots: phase0.block_roots,
            state_roots: phase0.state_roots,
            historical_roots: phase0.historical_roots,
            eth1_data: phase0.eth1_data,
            eth1_data_votes: phase0.eth1_data_votes,
            eth1_deposit_index: 0,
            validators: PersistentList::default(),
            balances: PersistentList::default(),
            randao_mixes: phase0.randao_mixes,
            slashings: phase0.slashings,
            previous_epoch_participation: PersistentList::default(),
            current_epoch_participation: PersistentList::default(),
            justification_bits: BitVector::new(),
            previous_justified_checkpoint: Checkpoint::default(),
            current_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
            inactivity_scores: PersistentList::default(),
            current_sync_committee: Arc::new(SyncCommittee::default()),
            next_sync_committee: Arc::new(SyncCommittee::default()),
        };
        for index in 0..validator_count {
            state
                .push_validator(validator(index), MAX_EFFECTIVE_BALANCE)
                .expect("registry has room");
        }
        state
    }

    #[test]
    fn ssz_round_trip_selects_fork_by_slot() {
        let spec = NetworkSpec {
            altair_fork_epoch: 2,
            ..MINIMAL.with_genesis_fork(ForkName::Phase0)
        };
        let altair_slot = 2 * 8;

        let state = BeaconState::from(phase0_state(4, 3));
        let decoded = BeaconState::<Minimal>::from_ssz_bytes(&state.as_ssz_bytes(), &spec)
            .expect("valid phase0 state");
        assert_eq!(decoded.fork_name(), ForkName::Phase0);
        assert_eq!(decoded.tree_hash_root(), state.tree_hash_root());

        let state = BeaconState::from(altair_state(4, altair_slot));
        let decoded = BeaconState::<Minimal>::from_ssz_bytes(&state.as_ssz_bytes(), &spec)
            .expect("valid altair state");
        assert_eq!(decoded.fork_name(), ForkName::Altair);
        assert_eq!(decoded, state);
    }

    #[test]
    fn short_per_validator_lists_are_rejected() {
        let spec = NetworkSpec {
            altair_fork_epoch: 2,
            ..MINIMAL.with_genesis_fork(ForkName::Phase0)
        };

        let mut state = altair_state(4, 2 * 8);
        state.inactivity_scores = PersistentList::default();
        let error = BeaconState::<Minimal>::from_ssz_bytes(&state.as_ssz_bytes(), &spec)
            .expect_err("inactivity scores are short");
        assert!(error.to_string().contains("inactivity_scores"));

        let mut state = phase0_state(4, 3);
        state.balances = PersistentList::new(vec![MAX_EFFECTIVE_BALANCE; 3]).expect("fits");
        assert!(BeaconState::<Minimal>::from_ssz_bytes(&state.as_ssz_bytes(), &spec).is_err());
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        assert!(BeaconState::<Minimal>::from_ssz_bytes(&[0; 47], &MINIMAL).is_err());
    }

    #[test]
    fn push_validator_extends_participation() {
        let state = altair_state(5, 0);
        assert_eq!(state.validators().len(), 5);
        assert_eq!(state.balances().len(), 5);
        assert_eq!(state.previous_epoch_participation().len(), 5);
        assert_eq!(state.current_epoch_participation().len(), 5);
        assert_eq!(state.inactivity_scores().len(), 5);
    }

    #[test]
    fn clones_are_independent() {
        let original = BeaconState::from(phase0_state(8, 0));
        let mut branch = original.clone();
        *branch.slot_mut() += 1;
        *branch.balances_mut().get_mut(3).expect("validator exists") -= 1;

        assert_eq!(original.slot(), 0);
        assert_eq!(original.balances().get(3), Some(&MAX_EFFECTIVE_BALANCE));
        assert_ne!(original.tree_hash_root(), branch.tree_hash_root());
    }

    #[test]
    fn accessors_follow_the_registry() {
        let state = phase0_state(64, 17);
        assert_eq!(state.get_current_epoch(), 2);
        assert_eq!(state.get_previous_epoch(), 1);
        assert_eq!(state.get_active_validator_indices(2).len(), 64);
        assert_eq!(
            state.get_total_active_balance().expect("validators exist"),
            64 * MAX_EFFECTIVE_BALANCE
        );
        assert_eq!(
            state.get_total_balance(vec![]).expect("empty set"),
            EFFECTIVE_BALANCE_INCREMENT
        );
        assert_eq!(state.get_committee_count_per_slot(2), 2);

        let proposer = state.get_beacon_proposer_index().expect("proposer exists");
        assert!(proposer < 64);

        let committees: Vec<u64> = (16..24)
            .flat_map(|slot| [(slot, 0), (slot, 1)])
            .flat_map(|(slot, index)| state.get_beacon_committee(slot, index).expect("committee"))
            .collect();
        let mut sorted = committees.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn block_root_lookups_are_bounded() {
        let mut state = phase0_state(1, 10);
        state.block_roots[9] = B256::repeat_byte(9);
        assert_eq!(state.get_block_root_at_slot(9).expect("recent slot"), B256::repeat_byte(9));
        assert!(state.get_block_root_at_slot(10).is_err());
    }

    #[test]
    fn next_sync_committee_is_full_size() {
        let state = altair_state(16, 0);
        let indices = state.get_next_sync_committee_indices().expect("active validators");
        assert_eq!(indices.len(), 32);
        assert!(indices.iter().all(|index| *index < 16));

        let committee = state.get_next_sync_committee().expect("valid pubkeys");
        for (pubkey, index) in committee.pubkeys.iter().zip(&indices) {
            let validator = state.validators.get(*index as usize).expect("in registry");
            assert_eq!(pubkey, &validator.pubkey);
        }
    }
}
