use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use alloy_primitives::{B256, aliases::B32};
use anyhow::{anyhow, ensure};
use ember_bls::{AggregatePubKey, PubKey};
use ember_network_spec::{ForkName, NetworkSpec};
use ember_persistent::{PersistentList, PersistentVector};
use ethereum_hashing::{hash, hash_fixed};
use ssz_types::{BitList, BitVector, FixedVector, VariableList, typenum::U4};

use crate::{
    altair::beacon_state::BeaconState as AltairBeaconState,
    attestation::Attestation,
    attestation_data::AttestationData,
    beacon_block_header::BeaconBlockHeader,
    bellatrix::beacon_state::BeaconState as BellatrixBeaconState,
    checkpoint::Checkpoint,
    constants::{
        BASE_REWARD_FACTOR, DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER,
        DOMAIN_SYNC_COMMITTEE, EFFECTIVE_BALANCE_INCREMENT, GENESIS_EPOCH, MAX_EFFECTIVE_BALANCE,
        MAX_RANDOM_BYTE, MIN_ATTESTATION_INCLUSION_DELAY, MIN_EPOCHS_TO_INACTIVITY_PENALTY,
        MIN_SEED_LOOKAHEAD, PARTICIPATION_FLAG_WEIGHTS, TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX,
        TIMELY_TARGET_FLAG_INDEX,
    },
    eth_1_data::Eth1Data,
    fork::Fork,
    indexed_attestation::IndexedAttestation,
    misc::{
        compute_committee, compute_domain, compute_epoch_at_slot, compute_shuffled_index,
        compute_start_slot_at_epoch, integer_squareroot,
    },
    phase0::beacon_state::BeaconState as Phase0BeaconState,
    preset::Preset,
    sync_committee::SyncCommittee,
    validator::Validator,
};

/// Accessors shared by every fork's `BeaconState`, plus the read-only helpers built on them.
pub trait BeaconStateView<P: Preset> {
    fn fork_name(&self) -> ForkName;

    fn genesis_time(&self) -> u64;
    fn genesis_validators_root(&self) -> B256;
    fn slot(&self) -> u64;
    fn slot_mut(&mut self) -> &mut u64;
    fn fork(&self) -> &Fork;
    fn fork_mut(&mut self) -> &mut Fork;

    fn latest_block_header(&self) -> &BeaconBlockHeader;
    fn latest_block_header_mut(&mut self) -> &mut BeaconBlockHeader;
    fn block_roots(&self) -> &PersistentVector<B256, P::SlotsPerHistoricalRoot>;
    fn block_roots_mut(&mut self) -> &mut PersistentVector<B256, P::SlotsPerHistoricalRoot>;
    fn state_roots(&self) -> &PersistentVector<B256, P::SlotsPerHistoricalRoot>;
    fn state_roots_mut(&mut self) -> &mut PersistentVector<B256, P::SlotsPerHistoricalRoot>;
    fn historical_roots(&self) -> &PersistentList<B256, P::HistoricalRootsLimit>;
    fn historical_roots_mut(&mut self) -> &mut PersistentList<B256, P::HistoricalRootsLimit>;

    fn eth1_data(&self) -> &Eth1Data;
    fn eth1_data_mut(&mut self) -> &mut Eth1Data;
    fn eth1_data_votes(&self) -> &PersistentList<Eth1Data, P::SlotsPerEth1VotingPeriod>;
    fn eth1_data_votes_mut(
        &mut self,
    ) -> &mut PersistentList<Eth1Data, P::SlotsPerEth1VotingPeriod>;
    fn eth1_deposit_index(&self) -> u64;
    fn eth1_deposit_index_mut(&mut self) -> &mut u64;

    fn validators(&self) -> &PersistentList<Validator, P::ValidatorRegistryLimit>;
    fn validators_mut(&mut self) -> &mut PersistentList<Validator, P::ValidatorRegistryLimit>;
    fn balances(&self) -> &PersistentList<u64, P::ValidatorRegistryLimit>;
    fn balances_mut(&mut self) -> &mut PersistentList<u64, P::ValidatorRegistryLimit>;

    fn randao_mixes(&self) -> &PersistentVector<B256, P::EpochsPerHistoricalVector>;
    fn randao_mixes_mut(&mut self) -> &mut PersistentVector<B256, P::EpochsPerHistoricalVector>;
    fn slashings(&self) -> &PersistentVector<u64, P::EpochsPerSlashingsVector>;
    fn slashings_mut(&mut self) -> &mut PersistentVector<u64, P::EpochsPerSlashingsVector>;

    fn justification_bits(&self) -> &BitVector<U4>;
    fn justification_bits_mut(&mut self) -> &mut BitVector<U4>;
    fn previous_justified_checkpoint(&self) -> Checkpoint;
    fn previous_justified_checkpoint_mut(&mut self) -> &mut Checkpoint;
    fn current_justified_checkpoint(&self) -> Checkpoint;
    fn current_justified_checkpoint_mut(&mut self) -> &mut Checkpoint;
    fn finalized_checkpoint(&self) -> Checkpoint;
    fn finalized_checkpoint_mut(&mut self) -> &mut Checkpoint;

    /// Appends a validator and every per-validator list the fork keeps alongside it.
    fn push_validator(&mut self, validator: Validator, balance: u64) -> anyhow::Result<()>;

    /// Return the current epoch.
    fn get_current_epoch(&self) -> u64 {
        compute_epoch_at_slot::<P>(self.slot())
    }

    /// Return the previous epoch (unless the current epoch is ``GENESIS_EPOCH``).
    fn get_previous_epoch(&self) -> u64 {
        let current_epoch = self.get_current_epoch();
        if current_epoch == GENESIS_EPOCH {
            GENESIS_EPOCH
        } else {
            current_epoch - 1
        }
    }

    /// Return the block root at a recent ``slot``.
    fn get_block_root_at_slot(&self, slot: u64) -> anyhow::Result<B256> {
        ensure!(
            slot < self.slot() && self.slot() <= slot + P::SLOTS_PER_HISTORICAL_ROOT,
            "Slot {slot} is not within the recent history of state at slot {}",
            self.slot()
        );
        self.block_roots()
            .get((slot % P::SLOTS_PER_HISTORICAL_ROOT) as usize)
            .copied()
            .ok_or_else(|| anyhow!("Block root index out of bounds for slot {slot}"))
    }

    /// Return the block root at the start of a recent ``epoch``.
    fn get_block_root(&self, epoch: u64) -> anyhow::Result<B256> {
        self.get_block_root_at_slot(compute_start_slot_at_epoch::<P>(epoch))
    }

    /// Return the randao mix at a recent ``epoch``.
    fn get_randao_mix(&self, epoch: u64) -> B256 {
        self.randao_mixes()[(epoch % P::EPOCHS_PER_HISTORICAL_VECTOR) as usize]
    }

    /// Return the sequence of active validator indices at ``epoch``.
    fn get_active_validator_indices(&self, epoch: u64) -> Vec<u64> {
        self.validators()
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.is_active_validator(epoch).then_some(i as u64))
            .collect()
    }

    /// Return the validator churn limit for the current epoch.
    fn get_validator_churn_limit(&self, spec: &NetworkSpec) -> u64 {
        let active_validator_indices = self.get_active_validator_indices(self.get_current_epoch());
        spec.min_per_epoch_churn_limit
            .max(active_validator_indices.len() as u64 / spec.churn_limit_quotient)
    }

    /// Return the seed at ``epoch``.
    fn get_seed(&self, epoch: u64, domain_type: B32) -> B256 {
        let mix = self
            .get_randao_mix(epoch + P::EPOCHS_PER_HISTORICAL_VECTOR - MIN_SEED_LOOKAHEAD - 1);
        let epoch_with_index =
            [domain_type.as_slice(), &epoch.to_le_bytes(), mix.as_slice()].concat();
        B256::from(hash_fixed(&epoch_with_index))
    }

    /// Return the number of committees in each slot for the given ``epoch``.
    fn get_committee_count_per_slot(&self, epoch: u64) -> u64 {
        let active = self.get_active_validator_indices(epoch).len() as u64;
        (active / P::SLOTS_PER_EPOCH / P::TARGET_COMMITTEE_SIZE).clamp(1, P::MAX_COMMITTEES_PER_SLOT)
    }

    /// Return the beacon committee at ``slot`` for ``index``.
    fn get_beacon_committee(&self, slot: u64, index: u64) -> anyhow::Result<Vec<u64>> {
        let epoch = compute_epoch_at_slot::<P>(slot);
        let committees_per_slot = self.get_committee_count_per_slot(epoch);
        compute_committee::<P>(
            &self.get_active_validator_indices(epoch),
            self.get_seed(epoch, DOMAIN_BEACON_ATTESTER),
            (slot % P::SLOTS_PER_EPOCH) * committees_per_slot + index,
            committees_per_slot * P::SLOTS_PER_EPOCH,
        )
    }

    /// Return from ``indices`` a random index sampled by effective balance.
    fn compute_proposer_index(&self, indices: &[u64], seed: B256) -> anyhow::Result<u64> {
        ensure!(!indices.is_empty(), "No active validators to propose");

        let total = indices.len();
        let mut i = 0usize;
        loop {
            let candidate_index = indices[compute_shuffled_index::<P>(i % total, total, seed)?];
            let random_byte = hash(&[seed.as_slice(), &((i / 32) as u64).to_le_bytes()].concat())
                [i % 32] as u64;
            let effective_balance = self
                .validators()
                .get(candidate_index as usize)
                .ok_or_else(|| anyhow!("Validator {candidate_index} not found"))?
                .effective_balance;
            if effective_balance * MAX_RANDOM_BYTE >= MAX_EFFECTIVE_BALANCE * random_byte {
                return Ok(candidate_index);
            }
            i += 1;
        }
    }

    /// Return the beacon proposer index at the current slot.
    fn get_beacon_proposer_index(&self) -> anyhow::Result<u64> {
        let epoch = self.get_current_epoch();
        let seed = B256::from(hash_fixed(
            &[
                self.get_seed(epoch, DOMAIN_BEACON_PROPOSER).as_slice(),
                &self.slot().to_le_bytes(),
            ]
            .concat(),
        ));
        self.compute_proposer_index(&self.get_active_validator_indices(epoch), seed)
    }

    /// Return the combined effective balance of the ``indices``.
    /// ``EFFECTIVE_BALANCE_INCREMENT`` Gwei minimum to avoid divisions by zero.
    fn get_total_balance(&self, indices: impl IntoIterator<Item = u64>) -> anyhow::Result<u64> {
        let mut sum = 0u64;
        for index in indices {
            sum += self
                .validators()
                .get(index as usize)
                .ok_or_else(|| anyhow!("Validator {index} not found"))?
                .effective_balance;
        }
        Ok(sum.max(EFFECTIVE_BALANCE_INCREMENT))
    }

    /// Return the combined effective balance of the active validators.
    fn get_total_active_balance(&self) -> anyhow::Result<u64> {
        self.get_total_balance(self.get_active_validator_indices(self.get_current_epoch()))
    }

    /// Return the signature domain (fork version concatenated with domain type) of a message.
    fn get_domain(&self, domain_type: B32, epoch: Option<u64>) -> B256 {
        let epoch = epoch.unwrap_or_else(|| self.get_current_epoch());
        let fork = self.fork();
        let fork_version = if epoch < fork.epoch {
            fork.previous_version
        } else {
            fork.current_version
        };
        compute_domain(domain_type, fork_version, self.genesis_validators_root())
    }

    /// Return the set of attesting indices corresponding to ``data`` and ``bits``.
    fn get_attesting_indices(
        &self,
        data: &AttestationData,
        bits: &BitList<P::MaxValidatorsPerCommittee>,
    ) -> anyhow::Result<BTreeSet<u64>> {
        ensure!(
            data.index < self.get_committee_count_per_slot(data.target.epoch),
            "Committee index {} out of range",
            data.index
        );
        let committee = self.get_beacon_committee(data.slot, data.index)?;
        ensure!(
            bits.len() == committee.len(),
            "Aggregation bits length {} does not match committee size {}",
            bits.len(),
            committee.len()
        );
        Ok(committee
            .into_iter()
            .enumerate()
            .filter_map(|(i, index)| bits.get(i).ok()?.then_some(index))
            .collect())
    }

    /// Return the indexed attestation corresponding to ``attestation``.
    fn get_indexed_attestation(
        &self,
        attestation: &Attestation<P>,
    ) -> anyhow::Result<IndexedAttestation<P>> {
        let attesting_indices =
            self.get_attesting_indices(&attestation.data, &attestation.aggregation_bits)?;
        Ok(IndexedAttestation {
            attesting_indices: VariableList::new(attesting_indices.into_iter().collect())
                .map_err(|err| anyhow!("Too many attesting indices: {err:?}"))?,
            data: attestation.data.clone(),
            signature: attestation.signature.clone(),
        })
    }

    fn get_finality_delay(&self) -> u64 {
        self.get_previous_epoch() - self.finalized_checkpoint().epoch
    }

    fn is_in_inactivity_leak(&self) -> bool {
        self.get_finality_delay() > MIN_EPOCHS_TO_INACTIVITY_PENALTY
    }

    /// Return the validators that earn rewards or penalties for the previous epoch.
    fn get_eligible_validator_indices(&self) -> Vec<u64> {
        let previous_epoch = self.get_previous_epoch();
        self.validators()
            .iter()
            .enumerate()
            .filter_map(|(index, validator)| {
                (validator.is_active_validator(previous_epoch)
                    || (validator.slashed && previous_epoch + 1 < validator.withdrawable_epoch))
                    .then_some(index as u64)
            })
            .collect()
    }
}

/// Participation, inactivity and sync committee fields added by altair.
pub trait PostAltairBeaconState<P: Preset>: BeaconStateView<P> {
    fn previous_epoch_participation(&self) -> &PersistentList<u8, P::ValidatorRegistryLimit>;
    fn previous_epoch_participation_mut(
        &mut self,
    ) -> &mut PersistentList<u8, P::ValidatorRegistryLimit>;
    fn current_epoch_participation(&self) -> &PersistentList<u8, P::ValidatorRegistryLimit>;
    fn current_epoch_participation_mut(
        &mut self,
    ) -> &mut PersistentList<u8, P::ValidatorRegistryLimit>;
    fn inactivity_scores(&self) -> &PersistentList<u64, P::ValidatorRegistryLimit>;
    fn inactivity_scores_mut(&mut self) -> &mut PersistentList<u64, P::ValidatorRegistryLimit>;
    fn current_sync_committee(&self) -> &Arc<SyncCommittee<P>>;
    fn current_sync_committee_mut(&mut self) -> &mut Arc<SyncCommittee<P>>;
    fn next_sync_committee(&self) -> &Arc<SyncCommittee<P>>;
    fn next_sync_committee_mut(&mut self) -> &mut Arc<SyncCommittee<P>>;

    fn get_base_reward_per_increment(&self) -> anyhow::Result<u64> {
        Ok(EFFECTIVE_BALANCE_INCREMENT * BASE_REWARD_FACTOR
            / integer_squareroot(self.get_total_active_balance()?))
    }

    /// Return the base reward for the validator defined by ``index`` with respect to the
    /// current ``state``.
    fn get_base_reward(&self, index: u64) -> anyhow::Result<u64> {
        let increments = self
            .validators()
            .get(index as usize)
            .ok_or_else(|| anyhow!("Validator {index} not found"))?
            .effective_balance
            / EFFECTIVE_BALANCE_INCREMENT;
        Ok(increments * self.get_base_reward_per_increment()?)
    }

    /// Return the set of validator indices that are both active and unslashed for the given
    /// ``flag_index`` and ``epoch``.
    fn get_unslashed_participating_indices(
        &self,
        flag_index: u8,
        epoch: u64,
    ) -> anyhow::Result<HashSet<u64>> {
        let current_epoch = self.get_current_epoch();
        ensure!(
            epoch == self.get_previous_epoch() || epoch == current_epoch,
            "Epoch {epoch} is neither the previous nor the current epoch"
        );
        let participation = if epoch == current_epoch {
            self.current_epoch_participation()
        } else {
            self.previous_epoch_participation()
        };
        let validators = self.validators();
        Ok(self
            .get_active_validator_indices(epoch)
            .into_iter()
            .filter(|&index| {
                participation
                    .get(index as usize)
                    .is_some_and(|flags| has_flag(*flags, flag_index))
                    && validators
                        .get(index as usize)
                        .is_some_and(|validator| !validator.slashed)
            })
            .collect())
    }

    /// Return the flag indices that are satisfied by an attestation.
    fn get_attestation_participation_flag_indices(
        &self,
        data: &AttestationData,
        inclusion_delay: u64,
    ) -> anyhow::Result<Vec<u8>> {
        let justified_checkpoint = if data.target.epoch == self.get_current_epoch() {
            self.current_justified_checkpoint()
        } else {
            self.previous_justified_checkpoint()
        };

        let is_matching_source = data.source == justified_checkpoint;
        ensure!(is_matching_source, "Attestation source does not match justified checkpoint");
        let is_matching_target = data.target.root == self.get_block_root(data.target.epoch)?;
        let is_matching_head = is_matching_target
            && data.beacon_block_root == self.get_block_root_at_slot(data.slot)?;

        let mut participation_flag_indices = vec![];
        if inclusion_delay <= integer_squareroot(P::SLOTS_PER_EPOCH) {
            participation_flag_indices.push(TIMELY_SOURCE_FLAG_INDEX);
        }
        if is_matching_target && inclusion_delay <= P::SLOTS_PER_EPOCH {
            participation_flag_indices.push(TIMELY_TARGET_FLAG_INDEX);
        }
        if is_matching_head && inclusion_delay == MIN_ATTESTATION_INCLUSION_DELAY {
            participation_flag_indices.push(TIMELY_HEAD_FLAG_INDEX);
        }
        Ok(participation_flag_indices)
    }

    /// Return the sync committee indices, with possible duplicates, for the next sync committee.
    fn get_next_sync_committee_indices(&self) -> anyhow::Result<Vec<u64>> {
        let epoch = self.get_current_epoch() + 1;
        let active_validator_indices = self.get_active_validator_indices(epoch);
        let active_validator_count = active_validator_indices.len();
        ensure!(active_validator_count > 0, "No active validators for the sync committee");
        let seed = self.get_seed(epoch, DOMAIN_SYNC_COMMITTEE);

        let mut i = 0usize;
        let mut sync_committee_indices = Vec::with_capacity(P::SYNC_COMMITTEE_SIZE as usize);
        while sync_committee_indices.len() < P::SYNC_COMMITTEE_SIZE as usize {
            let shuffled_index = compute_shuffled_index::<P>(
                i % active_validator_count,
                active_validator_count,
                seed,
            )?;
            let candidate_index = active_validator_indices[shuffled_index];
            let random_byte = hash(&[seed.as_slice(), &((i / 32) as u64).to_le_bytes()].concat())
                [i % 32] as u64;
            let effective_balance = self
                .validators()
                .get(candidate_index as usize)
                .ok_or_else(|| anyhow!("Validator {candidate_index} not found"))?
                .effective_balance;
            if effective_balance * MAX_RANDOM_BYTE >= MAX_EFFECTIVE_BALANCE * random_byte {
                sync_committee_indices.push(candidate_index);
            }
            i += 1;
        }
        Ok(sync_committee_indices)
    }

    /// Return the next sync committee, with possible pubkey duplicates.
    fn get_next_sync_committee(&self) -> anyhow::Result<SyncCommittee<P>> {
        let validators = self.validators();
        let pubkeys = self
            .get_next_sync_committee_indices()?
            .into_iter()
            .map(|index| {
                validators
                    .get(index as usize)
                    .map(|validator| validator.pubkey.clone())
                    .ok_or_else(|| anyhow!("Validator {index} not found"))
            })
            .collect::<anyhow::Result<Vec<PubKey>>>()?;
        let aggregate_pubkey =
            AggregatePubKey::aggregate(&pubkeys.iter().collect::<Vec<_>>())?.to_pubkey();
        Ok(SyncCommittee {
            pubkeys: FixedVector::new(pubkeys)
                .map_err(|err| anyhow!("Wrong sync committee size: {err:?}"))?,
            aggregate_pubkey,
        })
    }
}

pub fn has_flag(flags: u8, flag_index: u8) -> bool {
    let flag = 1 << flag_index;
    flags & flag == flag
}

pub fn add_flag(flags: u8, flag_index: u8) -> u8 {
    flags | (1 << flag_index)
}

/// Sum of the participation flag weights a set of flag indices earns.
pub fn participation_weight(flag_indices: &[u8]) -> u64 {
    flag_indices
        .iter()
        .map(|&index| PARTICIPATION_FLAG_WEIGHTS[index as usize])
        .sum()
}

macro_rules! push_validator_fields {
    ($state:ident, Phase0) => {};
    ($state:ident, $fork:ident) => {
        $state.previous_epoch_participation.push(0)?;
        $state.current_epoch_participation.push(0)?;
        $state.inactivity_scores.push(0)?;
    };
}

macro_rules! impl_beacon_state_view {
    ($state:ident, $fork:ident) => {
        impl<P: Preset> BeaconStateView<P> for $state<P> {
            fn fork_name(&self) -> ForkName {
                ForkName::$fork
            }

            fn genesis_time(&self) -> u64 {
                self.genesis_time
            }

            fn genesis_validators_root(&self) -> B256 {
                self.genesis_validators_root
            }

            fn slot(&self) -> u64 {
                self.slot
            }

            fn slot_mut(&mut self) -> &mut u64 {
                &mut self.slot
            }

            fn fork(&self) -> &Fork {
                &self.fork
            }

            fn fork_mut(&mut self) -> &mut Fork {
                &mut self.fork
            }

            fn latest_block_header(&self) -> &BeaconBlockHeader {
                &self.latest_block_header
            }

            fn latest_block_header_mut(&mut self) -> &mut BeaconBlockHeader {
                &mut self.latest_block_header
            }

            fn block_roots(&self) -> &PersistentVector<B256, P::SlotsPerHistoricalRoot> {
                &self.block_roots
            }

            fn block_roots_mut(
                &mut self,
            ) -> &mut PersistentVector<B256, P::SlotsPerHistoricalRoot> {
                &mut self.block_roots
            }

            fn state_roots(&self) -> &PersistentVector<B256, P::SlotsPerHistoricalRoot> {
                &self.state_roots
            }

            fn state_roots_mut(
                &mut self,
            ) -> &mut PersistentVector<B256, P::SlotsPerHistoricalRoot> {
                &mut self.state_roots
            }

            fn historical_roots(&self) -> &PersistentList<B256, P::HistoricalRootsLimit> {
                &self.historical_roots
            }

            fn historical_roots_mut(
                &mut self,
            ) -> &mut PersistentList<B256, P::HistoricalRootsLimit> {
                &mut self.historical_roots
            }

            fn eth1_data(&self) -> &Eth1Data {
                &self.eth1_data
            }

            fn eth1_data_mut(&mut self) -> &mut Eth1Data {
                &mut self.eth1_data
            }

            fn eth1_data_votes(&self) -> &PersistentList<Eth1Data, P::SlotsPerEth1VotingPeriod> {
                &self.eth1_data_votes
            }

            fn eth1_data_votes_mut(
                &mut self,
            ) -> &mut PersistentList<Eth1Data, P::SlotsPerEth1VotingPeriod> {
                &mut self.eth1_data_votes
            }

            fn eth1_deposit_index(&self) -> u64 {
                self.eth1_deposit_index
            }

            fn eth1_deposit_index_mut(&mut self) -> &mut u64 {
                &mut self.eth1_deposit_index
            }

            fn validators(&self) -> &PersistentList<Validator, P::ValidatorRegistryLimit> {
                &self.validators
            }

            fn validators_mut(
                &mut self,
            ) -> &mut PersistentList<Validator, P::ValidatorRegistryLimit> {
                &mut self.validators
            }

            fn balances(&self) -> &PersistentList<u64, P::ValidatorRegistryLimit> {
                &self.balances
            }

            fn balances_mut(&mut self) -> &mut PersistentList<u64, P::ValidatorRegistryLimit> {
                &mut self.balances
            }

            fn randao_mixes(&self) -> &PersistentVector<B256, P::EpochsPerHistoricalVector> {
                &self.randao_mixes
            }

            fn randao_mixes_mut(
                &mut self,
            ) -> &mut PersistentVector<B256, P::EpochsPerHistoricalVector> {
                &mut self.randao_mixes
            }

            fn slashings(&self) -> &PersistentVector<u64, P::EpochsPerSlashingsVector> {
                &self.slashings
            }

            fn slashings_mut(
                &mut self,
            ) -> &mut PersistentVector<u64, P::EpochsPerSlashingsVector> {
                &mut self.slashings
            }

            fn justification_bits(&self) -> &BitVector<U4> {
                &self.justification_bits
            }

            fn justification_bits_mut(&mut self) -> &mut BitVector<U4> {
                &mut self.justification_bits
            }

            fn previous_justified_checkpoint(&self) -> Checkpoint {
                self.previous_justified_checkpoint
            }

            fn previous_justified_checkpoint_mut(&mut self) -> &mut Checkpoint {
                &mut self.previous_justified_checkpoint
            }

            fn current_justified_checkpoint(&self) -> Checkpoint {
                self.current_justified_checkpoint
            }

            fn current_justified_checkpoint_mut(&mut self) -> &mut Checkpoint {
                &mut self.current_justified_checkpoint
            }

            fn finalized_checkpoint(&self) -> Checkpoint {
                self.finalized_checkpoint
            }

            fn finalized_checkpoint_mut(&mut self) -> &mut Checkpoint {
                &mut self.finalized_checkpoint
            }

            fn push_validator(&mut self, validator: Validator, balance: u64) -> anyhow::Result<()> {
                push_validator_fields!(self, $fork);
                self.validators.push(validator)?;
                self.balances.push(balance)?;
                Ok(())
            }
        }
    };
}

macro_rules! impl_post_altair_beacon_state {
    ($state:ident) => {
        impl<P: Preset> PostAltairBeaconState<P> for $state<P> {
            fn previous_epoch_participation(
                &self,
            ) -> &PersistentList<u8, P::ValidatorRegistryLimit> {
                &self.previous_epoch_participation
            }

            fn previous_epoch_participation_mut(
                &mut self,
            ) -> &mut PersistentList<u8, P::ValidatorRegistryLimit> {
                &mut self.previous_epoch_participation
            }

            fn current_epoch_participation(&self) -> &PersistentList<u8, P::ValidatorRegistryLimit> {
                &self.current_epoch_participation
            }

            fn current_epoch_participation_mut(
                &mut self,
            ) -> &mut PersistentList<u8, P::ValidatorRegistryLimit> {
                &mut self.current_epoch_participation
            }

            fn inactivity_scores(&self) -> &PersistentList<u64, P::ValidatorRegistryLimit> {
                &self.inactivity_scores
            }

            fn inactivity_scores_mut(
                &mut self,
            ) -> &mut PersistentList<u64, P::ValidatorRegistryLimit> {
                &mut self.inactivity_scores
            }

            fn current_sync_committee(&self) -> &Arc<SyncCommittee<P>> {
                &self.current_sync_committee
            }

            fn current_sync_committee_mut(&mut self) -> &mut Arc<SyncCommittee<P>> {
                &mut self.current_sync_committee
            }

            fn next_sync_committee(&self) -> &Arc<SyncCommittee<P>> {
                &self.next_sync_committee
            }

            fn next_sync_committee_mut(&mut self) -> &mut Arc<SyncCommittee<P>> {
                &mut self.next_sync_committee
            }
        }
    };
}

impl_beacon_state_view!(Phase0BeaconState, Phase0);
impl_beacon_state_view!(AltairBeaconState, Altair);
impl_beacon_state_view!(BellatrixBeaconState, Bellatrix);

impl_post_altair_beacon_state!(AltairBeaconState);
impl_post_altair_beacon_state!(BellatrixBeaconState);
