//! Epoch processing for altair and every later fork, driven by participation flags.

use std::sync::Arc;

use anyhow::anyhow;
use ember_consensus::{
    constants::{
        BASE_REWARD_FACTOR, EFFECTIVE_BALANCE_INCREMENT, GENESIS_EPOCH, PARTICIPATION_FLAG_WEIGHTS,
        TIMELY_HEAD_FLAG_INDEX, WEIGHT_DENOMINATOR,
    },
    misc::integer_squareroot,
    preset::Preset,
    view::PostAltairBeaconState,
};
use ember_network_spec::NetworkSpec;
use ember_persistent::PersistentList;
use tracing::trace;

use super::{
    Deltas, apply_deltas, process_effective_balance_updates, process_eth1_data_reset,
    process_historical_roots_update, process_justification_and_finalization,
    process_randao_mixes_reset, process_registry_updates, process_slashings,
    process_slashings_reset,
};
use crate::{
    epoch_cache::EpochTransitionCache, errors::EpochProcessingError,
    mutators::inactivity_penalty_quotient,
};

pub fn process_epoch<P: Preset, S: PostAltairBeaconState<P>>(
    state: &mut S,
    spec: &NetworkSpec,
) -> Result<(), EpochProcessingError> {
    let cache = EpochTransitionCache::new_altair(state)?;
    process_justification_and_finalization(state, &cache)?;
    process_inactivity_updates(state, &cache, spec)?;
    process_rewards_and_penalties(state, &cache, spec)?;
    process_registry_updates(state, spec)?;
    process_slashings(state, &cache)?;
    process_eth1_data_reset(state);
    process_effective_balance_updates(state)?;
    process_slashings_reset(state)?;
    process_randao_mixes_reset(state)?;
    process_historical_roots_update(state)?;
    process_participation_flag_updates(state)?;
    process_sync_committee_updates(state)?;
    Ok(())
}

pub fn process_inactivity_updates<P: Preset, S: PostAltairBeaconState<P>>(
    state: &mut S,
    cache: &EpochTransitionCache,
    spec: &NetworkSpec,
) -> anyhow::Result<()> {
    // Skip the genesis epoch as score updates are based on the previous epoch participation
    if cache.current_epoch == GENESIS_EPOCH {
        return Ok(());
    }
    let is_in_inactivity_leak = state.is_in_inactivity_leak();
    let mut scores = state.inactivity_scores().to_vec();
    for index in cache.eligible_indices() {
        let score = scores
            .get_mut(index)
            .ok_or_else(|| anyhow!("No inactivity score for validator {index}"))?;
        // Increase the inactivity score of inactive validators
        if cache.statuses[index].is_previous_epoch_target_attester {
            *score -= (*score).min(1);
        } else {
            *score += spec.inactivity_score_bias;
        }
        // Decrease the inactivity score of all eligible validators during a leak-free epoch
        if !is_in_inactivity_leak {
            *score -= (*score).min(spec.inactivity_score_recovery_rate);
        }
    }
    *state.inactivity_scores_mut() = PersistentList::new(scores)?;
    Ok(())
}

pub fn process_rewards_and_penalties<P: Preset, S: PostAltairBeaconState<P>>(
    state: &mut S,
    cache: &EpochTransitionCache,
    spec: &NetworkSpec,
) -> anyhow::Result<()> {
    // No rewards are applied at the end of `GENESIS_EPOCH` because rewards are for work done
    // in the previous epoch
    if cache.current_epoch == GENESIS_EPOCH {
        return Ok(());
    }
    let mut deltas = (0..PARTICIPATION_FLAG_WEIGHTS.len() as u8)
        .map(|flag_index| get_flag_index_deltas(state, cache, flag_index))
        .collect::<anyhow::Result<Vec<_>>>()?;
    deltas.push(get_inactivity_penalty_deltas(state, cache, spec)?);
    apply_deltas(state, &deltas)
}

/// Return the deltas for a given ``flag_index`` by scanning through the participation flags.
pub fn get_flag_index_deltas<P: Preset, S: PostAltairBeaconState<P>>(
    state: &S,
    cache: &EpochTransitionCache,
    flag_index: u8,
) -> anyhow::Result<Deltas> {
    let mut deltas = Deltas::new(cache.statuses.len());
    let weight = PARTICIPATION_FLAG_WEIGHTS[flag_index as usize];
    let base_reward_per_increment = EFFECTIVE_BALANCE_INCREMENT * BASE_REWARD_FACTOR
        / integer_squareroot(cache.total_active_balance);
    let participating_increments =
        cache.previous_epoch_flag_balance(flag_index) / EFFECTIVE_BALANCE_INCREMENT;
    let active_increments = cache.total_active_balance / EFFECTIVE_BALANCE_INCREMENT;
    let is_in_inactivity_leak = state.is_in_inactivity_leak();

    for index in cache.eligible_indices() {
        let status = &cache.statuses[index];
        let base_reward =
            status.effective_balance / EFFECTIVE_BALANCE_INCREMENT * base_reward_per_increment;
        if status.has_previous_epoch_flag(flag_index) {
            if !is_in_inactivity_leak {
                let reward_numerator = base_reward * weight * participating_increments;
                deltas.reward(index, reward_numerator / (active_increments * WEIGHT_DENOMINATOR))?;
            }
        } else if flag_index != TIMELY_HEAD_FLAG_INDEX {
            deltas.penalize(index, base_reward * weight / WEIGHT_DENOMINATOR)?;
        }
    }
    Ok(deltas)
}

/// Return the inactivity penalty deltas by considering timely target participation flags and
/// inactivity scores.
pub fn get_inactivity_penalty_deltas<P: Preset, S: PostAltairBeaconState<P>>(
    state: &S,
    cache: &EpochTransitionCache,
    spec: &NetworkSpec,
) -> anyhow::Result<Deltas> {
    let mut deltas = Deltas::new(cache.statuses.len());
    let penalty_denominator =
        spec.inactivity_score_bias * inactivity_penalty_quotient::<P>(state.fork_name());
    let scores = state.inactivity_scores();
    for index in cache.eligible_indices() {
        let status = &cache.statuses[index];
        if status.is_previous_epoch_target_attester {
            continue;
        }
        let score = *scores
            .get(index)
            .ok_or_else(|| anyhow!("No inactivity score for validator {index}"))?;
        deltas.penalize(index, status.effective_balance * score / penalty_denominator)?;
    }
    Ok(deltas)
}

pub fn process_participation_flag_updates<P: Preset, S: PostAltairBeaconState<P>>(
    state: &mut S,
) -> anyhow::Result<()> {
    let validator_count = state.validators().len();
    let current = std::mem::replace(
        state.current_epoch_participation_mut(),
        PersistentList::new(vec![0; validator_count])?,
    );
    *state.previous_epoch_participation_mut() = current;
    Ok(())
}

pub fn process_sync_committee_updates<P: Preset, S: PostAltairBeaconState<P>>(
    state: &mut S,
) -> anyhow::Result<()> {
    let next_epoch = state.get_current_epoch() + 1;
    if next_epoch % P::EPOCHS_PER_SYNC_COMMITTEE_PERIOD == 0 {
        let next_sync_committee = Arc::new(state.get_next_sync_committee()?);
        let current = std::mem::replace(state.next_sync_committee_mut(), next_sync_committee);
        *state.current_sync_committee_mut() = current;
        trace!(next_epoch, "Rotated sync committees");
    }
    Ok(())
}
