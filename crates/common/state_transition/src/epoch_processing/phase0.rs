use ember_consensus::{
    constants::{
        BASE_REWARD_FACTOR, BASE_REWARDS_PER_EPOCH, EFFECTIVE_BALANCE_INCREMENT, GENESIS_EPOCH,
        PROPOSER_REWARD_QUOTIENT, TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX,
        TIMELY_TARGET_FLAG_INDEX,
    },
    misc::integer_squareroot,
    phase0::beacon_state::BeaconState,
    preset::Preset,
    view::BeaconStateView,
};
use ember_network_spec::NetworkSpec;
use ember_persistent::PersistentList;

use super::{
    Deltas, apply_deltas, process_effective_balance_updates, process_eth1_data_reset,
    process_historical_roots_update, process_justification_and_finalization,
    process_randao_mixes_reset, process_registry_updates, process_slashings,
    process_slashings_reset,
};
use crate::{
    epoch_cache::{EpochTransitionCache, ValidatorStatus},
    errors::EpochProcessingError,
};

pub fn process_epoch<P: Preset>(
    state: &mut BeaconState<P>,
    spec: &NetworkSpec,
) -> Result<(), EpochProcessingError> {
    let cache = EpochTransitionCache::new_phase0(state)?;
    process_justification_and_finalization(state, &cache)?;
    process_rewards_and_penalties(state, &cache)?;
    process_registry_updates(state, spec)?;
    process_slashings(state, &cache)?;
    process_eth1_data_reset(state);
    process_effective_balance_updates(state)?;
    process_slashings_reset(state)?;
    process_randao_mixes_reset(state)?;
    process_historical_roots_update(state)?;
    process_participation_record_updates(state);
    Ok(())
}

pub fn process_rewards_and_penalties<P: Preset>(
    state: &mut BeaconState<P>,
    cache: &EpochTransitionCache,
) -> anyhow::Result<()> {
    // No rewards are applied at the end of `GENESIS_EPOCH` because rewards are for work done
    // in the previous epoch
    if cache.current_epoch == GENESIS_EPOCH {
        return Ok(());
    }
    let deltas = get_attestation_deltas(state, cache)?;
    apply_deltas(state, &[deltas])
}

fn get_base_reward(status: &ValidatorStatus, total_balance_sqrt: u64) -> u64 {
    status.effective_balance * BASE_REWARD_FACTOR / total_balance_sqrt / BASE_REWARDS_PER_EPOCH
}

/// Sums the source, target, head, inclusion delay and inactivity components into one set of
/// deltas.
pub fn get_attestation_deltas<P: Preset>(
    state: &BeaconState<P>,
    cache: &EpochTransitionCache,
) -> anyhow::Result<Deltas> {
    let mut deltas = Deltas::new(cache.statuses.len());
    let total_balance = cache.total_active_balance;
    let total_balance_sqrt = integer_squareroot(total_balance);
    let is_in_inactivity_leak = state.is_in_inactivity_leak();

    // Source, target and head
    for flag_index in [
        TIMELY_SOURCE_FLAG_INDEX,
        TIMELY_TARGET_FLAG_INDEX,
        TIMELY_HEAD_FLAG_INDEX,
    ] {
        let attesting_balance = cache.previous_epoch_flag_balance(flag_index);
        for index in cache.eligible_indices() {
            let status = &cache.statuses[index];
            let base_reward = get_base_reward(status, total_balance_sqrt);
            if status.has_previous_epoch_flag(flag_index) {
                if is_in_inactivity_leak {
                    // Since full base reward will be canceled out by inactivity penalty
                    // deltas, optimal participation receives full base reward compensation
                    // here.
                    deltas.reward(index, base_reward)?;
                } else {
                    let increment = EFFECTIVE_BALANCE_INCREMENT;
                    let reward_numerator = base_reward * (attesting_balance / increment);
                    deltas.reward(index, reward_numerator / (total_balance / increment))?;
                }
            } else {
                deltas.penalize(index, base_reward)?;
            }
        }
    }

    // Proposer and inclusion delay micro-rewards
    for (index, status) in cache.statuses.iter().enumerate() {
        let Some(inclusion_info) = status.inclusion_info else {
            continue;
        };
        let base_reward = get_base_reward(status, total_balance_sqrt);
        let proposer_reward = base_reward / PROPOSER_REWARD_QUOTIENT;
        deltas.reward(inclusion_info.proposer_index as usize, proposer_reward)?;
        let max_attester_reward = base_reward - proposer_reward;
        deltas.reward(index, max_attester_reward / inclusion_info.delay)?;
    }

    // Inactivity penalty
    if is_in_inactivity_leak {
        let finality_delay = state.get_finality_delay();
        for index in cache.eligible_indices() {
            let status = &cache.statuses[index];
            // If validator is performing optimally this cancels all rewards for a neutral
            // balance
            let base_reward = get_base_reward(status, total_balance_sqrt);
            deltas.penalize(
                index,
                BASE_REWARDS_PER_EPOCH * base_reward - base_reward / PROPOSER_REWARD_QUOTIENT,
            )?;
            if !status.is_previous_epoch_target_attester {
                deltas.penalize(
                    index,
                    status.effective_balance * finality_delay / P::INACTIVITY_PENALTY_QUOTIENT,
                )?;
            }
        }
    }
    Ok(deltas)
}

pub fn process_participation_record_updates<P: Preset>(state: &mut BeaconState<P>) {
    // Rotate current/previous epoch attestations
    state.previous_epoch_attestations = std::mem::replace(
        &mut state.current_epoch_attestations,
        PersistentList::default(),
    );
}

#[cfg(test)]
mod tests {
    use ember_consensus::{
        beacon_state::BeaconState as AnyBeaconState, constants::MAX_EFFECTIVE_BALANCE,
        preset::Minimal,
    };
    use ember_network_spec::MINIMAL;

    use super::*;
    use crate::{
        block_processing, signature_collector::SignatureCollector,
        test_utils::{advance, full_attestations, phase0_state},
    };

    fn state_at(slot: u64) -> BeaconState<Minimal> {
        let AnyBeaconState::Phase0(state) =
            advance(AnyBeaconState::from(phase0_state(64)), slot, &MINIMAL)
        else {
            panic!("phase0 state expected");
        };
        state
    }

    fn attest_slots(state: &mut BeaconState<Minimal>, slots: std::ops::Range<u64>) {
        for slot in slots {
            for attestation in full_attestations(&*state, slot) {
                block_processing::phase0::process_attestation(
                    state,
                    &attestation,
                    &mut SignatureCollector::disabled(),
                )
                .expect("valid attestation");
            }
        }
    }

    #[test]
    fn participants_gain_and_absentees_lose() {
        // Previous epoch 0 fully attested, included from slots 9 to 15 of epoch 1.
        let mut state = state_at(9);
        attest_slots(&mut state, 1..8);
        let AnyBeaconState::Phase0(mut state) =
            advance(AnyBeaconState::Phase0(state), 15, &MINIMAL)
        else {
            panic!("phase0 state expected");
        };
        // Slot 0 was never attested, so its committee loses. Skip whoever proposed the
        // inclusion block, since it also earns proposer micro-rewards.
        let proposer = state
            .previous_epoch_attestations
            .get(0)
            .expect("pending attestation")
            .proposer_index;
        let absent = state
            .get_beacon_committee(0, 0)
            .expect("committee")
            .into_iter()
            .find(|&index| index != proposer)
            .expect("non-proposer in committee");
        let present = state
            .get_beacon_committee(1, 0)
            .expect("committee")
            .into_iter()
            .next()
            .expect("non-empty committee");

        let cache = EpochTransitionCache::new_phase0(&state).expect("cache");
        assert_eq!(cache.current_epoch, 1);
        let deltas = get_attestation_deltas(&state, &cache).expect("deltas");
        assert!(deltas.rewards[present as usize] > deltas.penalties[present as usize]);
        assert_eq!(deltas.rewards[absent as usize], 0);
        assert!(deltas.penalties[absent as usize] > 0);

        process_rewards_and_penalties(&mut state, &cache).expect("rewards");
        assert!(*state.balances.get(present as usize).expect("balance") > MAX_EFFECTIVE_BALANCE);
        assert!(*state.balances.get(absent as usize).expect("balance") < MAX_EFFECTIVE_BALANCE);
    }

    #[test]
    fn genesis_epoch_pays_nothing() {
        let mut state = state_at(7);
        attest_slots(&mut state, 1..7);
        let cache = EpochTransitionCache::new_phase0(&state).expect("cache");
        let before = state.balances.clone();
        process_rewards_and_penalties(&mut state, &cache).expect("rewards");
        assert!(state.balances.ptr_eq(&before));
    }

    #[test]
    fn inactivity_leak_penalizes_everyone() {
        let mut state = state_at(7);
        // Pretend the chain has not finalized for a long while.
        state.slot = 6 * Minimal::SLOTS_PER_EPOCH + 7;
        let cache = EpochTransitionCache::new_phase0(&state).expect("cache");
        assert!(state.is_in_inactivity_leak());
        let deltas = get_attestation_deltas(&state, &cache).expect("deltas");
        assert!(deltas.rewards.iter().all(|&reward| reward == 0));
        assert!(deltas.penalties.iter().all(|&penalty| penalty > 0));
    }

    #[test]
    fn participation_records_rotate() {
        let mut state = state_at(7);
        attest_slots(&mut state, 5..7);
        let current = state.current_epoch_attestations.len();
        assert!(current > 0);
        process_participation_record_updates(&mut state);
        assert_eq!(state.previous_epoch_attestations.len(), current);
        assert!(state.current_epoch_attestations.is_empty());
    }
}
