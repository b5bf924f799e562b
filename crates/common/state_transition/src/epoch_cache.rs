//! Per-validator participation and balance totals gathered once at the start of an epoch
//! transition, so the steps that follow don't rescan attestations or the registry.

use anyhow::anyhow;
use ember_consensus::{
    constants::{
        EFFECTIVE_BALANCE_INCREMENT, TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX,
        TIMELY_TARGET_FLAG_INDEX,
    },
    phase0,
    preset::Preset,
    view::{BeaconStateView, PostAltairBeaconState, has_flag},
};

/// The earliest inclusion of a validator's previous epoch attestation (phase0 only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionInfo {
    pub delay: u64,
    pub proposer_index: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidatorStatus {
    pub effective_balance: u64,
    pub is_slashed: bool,
    pub is_active_in_current_epoch: bool,
    pub is_active_in_previous_epoch: bool,
    /// Earns rewards or penalties for the previous epoch.
    pub is_eligible: bool,
    pub is_previous_epoch_source_attester: bool,
    pub is_previous_epoch_target_attester: bool,
    pub is_previous_epoch_head_attester: bool,
    pub is_current_epoch_target_attester: bool,
    pub inclusion_info: Option<InclusionInfo>,
}

impl ValidatorStatus {
    /// Whether the validator attested with the previous epoch's `flag_index` and isn't slashed.
    pub fn has_previous_epoch_flag(&self, flag_index: u8) -> bool {
        match flag_index {
            TIMELY_SOURCE_FLAG_INDEX => self.is_previous_epoch_source_attester,
            TIMELY_TARGET_FLAG_INDEX => self.is_previous_epoch_target_attester,
            TIMELY_HEAD_FLAG_INDEX => self.is_previous_epoch_head_attester,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochTransitionCache {
    pub current_epoch: u64,
    pub previous_epoch: u64,
    pub total_active_balance: u64,
    pub previous_epoch_source_balance: u64,
    pub previous_epoch_target_balance: u64,
    pub previous_epoch_head_balance: u64,
    pub current_epoch_target_balance: u64,
    pub statuses: Vec<ValidatorStatus>,
}

impl EpochTransitionCache {
    fn from_registry<P: Preset, S: BeaconStateView<P>>(state: &S) -> Self {
        let current_epoch = state.get_current_epoch();
        let previous_epoch = state.get_previous_epoch();
        let statuses = state
            .validators()
            .iter()
            .map(|validator| {
                let is_active_in_previous_epoch = validator.is_active_validator(previous_epoch);
                ValidatorStatus {
                    effective_balance: validator.effective_balance,
                    is_slashed: validator.slashed,
                    is_active_in_current_epoch: validator.is_active_validator(current_epoch),
                    is_active_in_previous_epoch,
                    is_eligible: is_active_in_previous_epoch
                        || (validator.slashed
                            && previous_epoch + 1 < validator.withdrawable_epoch),
                    ..ValidatorStatus::default()
                }
            })
            .collect();
        Self {
            current_epoch,
            previous_epoch,
            total_active_balance: 0,
            previous_epoch_source_balance: 0,
            previous_epoch_target_balance: 0,
            previous_epoch_head_balance: 0,
            current_epoch_target_balance: 0,
            statuses,
        }
    }

    /// Sums effective balances per category, with the ``EFFECTIVE_BALANCE_INCREMENT`` floor
    /// `get_total_balance` applies.
    fn compute_totals(&mut self) {
        let total = |predicate: fn(&ValidatorStatus) -> bool| {
            self.statuses
                .iter()
                .filter(|status| predicate(status))
                .map(|status| status.effective_balance)
                .sum::<u64>()
                .max(EFFECTIVE_BALANCE_INCREMENT)
        };
        let totals = [
            total(|status| status.is_active_in_current_epoch),
            total(|status| status.is_previous_epoch_source_attester),
            total(|status| status.is_previous_epoch_target_attester),
            total(|status| status.is_previous_epoch_head_attester),
            total(|status| status.is_current_epoch_target_attester),
        ];
        [
            self.total_active_balance,
            self.previous_epoch_source_balance,
            self.previous_epoch_target_balance,
            self.previous_epoch_head_balance,
            self.current_epoch_target_balance,
        ] = totals;
    }

    /// Builds the cache from the pending attestations of a phase0 state.
    pub fn new_phase0<P: Preset>(
        state: &phase0::beacon_state::BeaconState<P>,
    ) -> anyhow::Result<Self> {
        let mut cache = Self::from_registry(state);
        let previous_epoch = cache.previous_epoch;
        let current_epoch = cache.current_epoch;

        // In the genesis epoch the previous epoch is the current one.
        let previous_attestations = if previous_epoch == current_epoch {
            &state.current_epoch_attestations
        } else {
            &state.previous_epoch_attestations
        };
        let previous_target_root = state.get_block_root(previous_epoch)?;
        for attestation in previous_attestations.iter() {
            let data = &attestation.data;
            let is_matching_target = data.target.root == previous_target_root;
            let is_matching_head = is_matching_target
                && data.beacon_block_root == state.get_block_root_at_slot(data.slot)?;
            for index in state.get_attesting_indices(data, &attestation.aggregation_bits)? {
                let status = cache
                    .statuses
                    .get_mut(index as usize)
                    .ok_or_else(|| anyhow!("Attester {index} not in registry"))?;
                if status.is_slashed {
                    continue;
                }
                status.is_previous_epoch_source_attester = true;
                status.is_previous_epoch_target_attester |= is_matching_target;
                status.is_previous_epoch_head_attester |= is_matching_head;

                let is_earlier = status
                    .inclusion_info
                    .is_none_or(|info| attestation.inclusion_delay < info.delay);
                if is_earlier {
                    status.inclusion_info = Some(InclusionInfo {
                        delay: attestation.inclusion_delay,
                        proposer_index: attestation.proposer_index,
                    });
                }
            }
        }

        let current_target_root = state.get_block_root(current_epoch)?;
        for attestation in state.current_epoch_attestations.iter() {
            let data = &attestation.data;
            if data.target.root != current_target_root {
                continue;
            }
            for index in state.get_attesting_indices(data, &attestation.aggregation_bits)? {
                let status = cache
                    .statuses
                    .get_mut(index as usize)
                    .ok_or_else(|| anyhow!("Attester {index} not in registry"))?;
                if !status.is_slashed {
                    status.is_current_epoch_target_attester = true;
                }
            }
        }

        cache.compute_totals();
        Ok(cache)
    }

    /// Builds the cache from the participation flags of an altair or later state.
    pub fn new_altair<P: Preset, S: PostAltairBeaconState<P>>(state: &S) -> anyhow::Result<Self> {
        let mut cache = Self::from_registry(state);
        let previous_participation = if cache.previous_epoch == cache.current_epoch {
            state.current_epoch_participation()
        } else {
            state.previous_epoch_participation()
        };
        let current_participation = state.current_epoch_participation();

        for (index, status) in cache.statuses.iter_mut().enumerate() {
            if status.is_slashed {
                continue;
            }
            if status.is_active_in_previous_epoch {
                let flags = *previous_participation
                    .get(index)
                    .ok_or_else(|| anyhow!("No participation record for validator {index}"))?;
                status.is_previous_epoch_source_attester =
                    has_flag(flags, TIMELY_SOURCE_FLAG_INDEX);
                status.is_previous_epoch_target_attester =
                    has_flag(flags, TIMELY_TARGET_FLAG_INDEX);
                status.is_previous_epoch_head_attester = has_flag(flags, TIMELY_HEAD_FLAG_INDEX);
            }
            if status.is_active_in_current_epoch {
                let flags = *current_participation
                    .get(index)
                    .ok_or_else(|| anyhow!("No participation record for validator {index}"))?;
                status.is_current_epoch_target_attester =
                    has_flag(flags, TIMELY_TARGET_FLAG_INDEX);
            }
        }

        cache.compute_totals();
        Ok(cache)
    }

    pub fn eligible_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.statuses
            .iter()
            .enumerate()
            .filter_map(|(index, status)| status.is_eligible.then_some(index))
    }

    /// Combined effective balance of the unslashed validators holding the previous epoch's
    /// `flag_index`.
    pub fn previous_epoch_flag_balance(&self, flag_index: u8) -> u64 {
        match flag_index {
            TIMELY_SOURCE_FLAG_INDEX => self.previous_epoch_source_balance,
            TIMELY_TARGET_FLAG_INDEX => self.previous_epoch_target_balance,
            _ => self.previous_epoch_head_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use ember_consensus::{
        beacon_state::BeaconState, constants::MAX_EFFECTIVE_BALANCE, preset::Minimal,
    };
    use ember_network_spec::{ForkName, MINIMAL};

    use super::*;
    use crate::{
        block_processing,
        signature_collector::SignatureCollector,
        test_utils::{advance, altair_state, full_attestations, phase0_state, spec_for},
    };

    #[test]
    fn phase0_cache_counts_pending_attestations() {
        let BeaconState::Phase0(mut state) =
            advance(BeaconState::from(phase0_state(64)), 7, &MINIMAL)
        else {
            panic!("phase0 state expected");
        };
        for slot in 4..6 {
            for attestation in full_attestations(&state, slot) {
                block_processing::phase0::process_attestation(
                    &mut state,
                    &attestation,
                    &mut SignatureCollector::disabled(),
                )
                .expect("valid attestation");
            }
        }

        let cache = EpochTransitionCache::new_phase0(&state).expect("cache builds");
        assert_eq!(cache.current_epoch, 0);
        assert_eq!(cache.total_active_balance, 64 * MAX_EFFECTIVE_BALANCE);
        // Slots 4 and 5 each cover an eighth of the registry.
        assert_eq!(cache.current_epoch_target_balance, 16 * MAX_EFFECTIVE_BALANCE);
        assert_eq!(cache.previous_epoch_source_balance, 16 * MAX_EFFECTIVE_BALANCE);
        assert!(cache.statuses.iter().any(|status| status.inclusion_info.is_some()));
        assert_eq!(cache.eligible_indices().count(), 64);
    }

    #[test]
    fn altair_cache_reads_flags_and_skips_slashed() {
        let spec = spec_for(ForkName::Altair);
        let BeaconState::Altair(mut state) =
            advance(BeaconState::from(altair_state(16)), 9, &spec)
        else {
            panic!("altair state expected");
        };
        for index in 0..4 {
            let flags = state
                .previous_epoch_participation
                .get_mut(index)
                .expect("participation");
            *flags = 0b111;
        }
        state.validators.get_mut(3).expect("validator").slashed = true;

        let cache = EpochTransitionCache::new_altair(&state).expect("cache builds");
        assert_eq!(cache.previous_epoch, 0);
        assert_eq!(cache.previous_epoch_target_balance, 3 * MAX_EFFECTIVE_BALANCE);
        assert_eq!(cache.previous_epoch_head_balance, 3 * MAX_EFFECTIVE_BALANCE);
        assert!(cache.statuses[2].has_previous_epoch_flag(TIMELY_HEAD_FLAG_INDEX));
        assert!(!cache.statuses[3].has_previous_epoch_flag(TIMELY_SOURCE_FLAG_INDEX));
        assert!(cache.statuses[3].is_eligible);
        assert_eq!(cache.current_epoch_target_balance, EFFECTIVE_BALANCE_INCREMENT);
    }
}
