//! Epoch processing steps shared by every fork, plus the fork dispatch at the top.

pub mod altair;
pub mod phase0;

use anyhow::anyhow;
use ember_consensus::{
    beacon_state::BeaconState,
    checkpoint::Checkpoint,
    constants::{EFFECTIVE_BALANCE_INCREMENT, GENESIS_EPOCH, JUSTIFICATION_BITS_LENGTH},
    historical_batch::HistoricalBatch,
    misc::compute_activation_exit_epoch,
    preset::Preset,
    view::BeaconStateView,
};
use ember_network_spec::NetworkSpec;
use ember_persistent::PersistentList;
use itertools::Itertools;
use tracing::debug;
use tree_hash::TreeHash;

use crate::{
    epoch_cache::EpochTransitionCache,
    errors::EpochProcessingError,
    mutators::{
        compute_effective_balance, decrease_balance, initiate_validator_exit,
        proportional_slashing_multiplier,
    },
};

/// Runs the end of epoch transition. Called on the last slot of an epoch, before the slot
/// is incremented.
pub fn process_epoch<P: Preset>(
    state: &mut BeaconState<P>,
    spec: &NetworkSpec,
) -> Result<(), EpochProcessingError> {
    match state {
        BeaconState::Phase0(state) => phase0::process_epoch(state, spec)?,
        BeaconState::Altair(state) => altair::process_epoch(state, spec)?,
        BeaconState::Bellatrix(state) => altair::process_epoch(state, spec)?,
    }
    debug!(
        epoch = state.get_current_epoch(),
        justified = state.current_justified_checkpoint().epoch,
        finalized = state.finalized_checkpoint().epoch,
        "Processed epoch"
    );
    Ok(())
}

/// Rewards and penalties of one reward component, indexed by validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deltas {
    pub rewards: Vec<u64>,
    pub penalties: Vec<u64>,
}

impl Deltas {
    pub fn new(validator_count: usize) -> Self {
        Self {
            rewards: vec![0; validator_count],
            penalties: vec![0; validator_count],
        }
    }

    pub fn reward(&mut self, index: usize, amount: u64) -> anyhow::Result<()> {
        *self
            .rewards
            .get_mut(index)
            .ok_or_else(|| anyhow!("No reward slot for validator {index}"))? += amount;
        Ok(())
    }

    pub fn penalize(&mut self, index: usize, amount: u64) -> anyhow::Result<()> {
        *self
            .penalties
            .get_mut(index)
            .ok_or_else(|| anyhow!("No penalty slot for validator {index}"))? += amount;
        Ok(())
    }
}

/// Applies each component's deltas in order to a scratch copy of the balances, then
/// rebuilds the balance list once.
pub fn apply_deltas<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    deltas: &[Deltas],
) -> anyhow::Result<()> {
    let mut balances = state.balances().to_vec();
    for component in deltas {
        for ((balance, reward), penalty) in balances
            .iter_mut()
            .zip(&component.rewards)
            .zip(&component.penalties)
        {
            *balance = (*balance + reward).saturating_sub(*penalty);
        }
    }
    *state.balances_mut() = PersistentList::new(balances)?;
    Ok(())
}

pub fn process_justification_and_finalization<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    cache: &EpochTransitionCache,
) -> anyhow::Result<()> {
    // Initial FFG checkpoint values have a `0x00` stub for `root`.
    // Skip FFG updates in the first two epochs to avoid corner cases that might result in
    // modifying this stub.
    if cache.current_epoch <= GENESIS_EPOCH + 1 {
        return Ok(());
    }
    weigh_justification_and_finalization(
        state,
        cache.total_active_balance,
        cache.previous_epoch_target_balance,
        cache.current_epoch_target_balance,
    )
}

pub fn weigh_justification_and_finalization<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    total_active_balance: u64,
    previous_epoch_target_balance: u64,
    current_epoch_target_balance: u64,
) -> anyhow::Result<()> {
    let previous_epoch = state.get_previous_epoch();
    let current_epoch = state.get_current_epoch();
    let old_previous_justified_checkpoint = state.previous_justified_checkpoint();
    let old_current_justified_checkpoint = state.current_justified_checkpoint();

    // Process justifications
    *state.previous_justified_checkpoint_mut() = old_current_justified_checkpoint;
    let bits = state.justification_bits_mut();
    for i in (1..JUSTIFICATION_BITS_LENGTH).rev() {
        let bit = bits
            .get(i - 1)
            .map_err(|err| anyhow!("Failed to get justification bit {err:?}"))?;
        bits.set(i, bit)
            .map_err(|err| anyhow!("Failed to set justification bit {err:?}"))?;
    }
    bits.set(0, false)
        .map_err(|err| anyhow!("Failed to set justification bit 0: {err:?}"))?;

    if previous_epoch_target_balance * 3 >= total_active_balance * 2 {
        *state.current_justified_checkpoint_mut() = Checkpoint {
            epoch: previous_epoch,
            root: state.get_block_root(previous_epoch)?,
        };
        state
            .justification_bits_mut()
            .set(1, true)
            .map_err(|err| anyhow!("Failed to set justification bit 1: {err:?}"))?;
    }
    if current_epoch_target_balance * 3 >= total_active_balance * 2 {
        *state.current_justified_checkpoint_mut() = Checkpoint {
            epoch: current_epoch,
            root: state.get_block_root(current_epoch)?,
        };
        state
            .justification_bits_mut()
            .set(0, true)
            .map_err(|err| anyhow!("Failed to set justification bit 0: {err:?}"))?;
    }

    // Process finalizations
    let bits: Vec<bool> = state.justification_bits().iter().collect();
    // The 2nd/3rd/4th most recent epochs are justified, the 2nd using the 4th as source
    if bits[1..4].iter().all(|&bit| bit)
        && old_previous_justified_checkpoint.epoch + 3 == current_epoch
    {
        *state.finalized_checkpoint_mut() = old_previous_justified_checkpoint;
    }
    // The 2nd/3rd most recent epochs are justified, the 2nd using the 3rd as source
    if bits[1..3].iter().all(|&bit| bit)
        && old_previous_justified_checkpoint.epoch + 2 == current_epoch
    {
        *state.finalized_checkpoint_mut() = old_previous_justified_checkpoint;
    }
    // The 1st/2nd/3rd most recent epochs are justified, the 1st using the 3rd as source
    if bits[0..3].iter().all(|&bit| bit)
        && old_current_justified_checkpoint.epoch + 2 == current_epoch
    {
        *state.finalized_checkpoint_mut() = old_current_justified_checkpoint;
    }
    // The 1st/2nd most recent epochs are justified, the 1st using the 2nd as source
    if bits[0..2].iter().all(|&bit| bit)
        && old_current_justified_checkpoint.epoch + 1 == current_epoch
    {
        *state.finalized_checkpoint_mut() = old_current_justified_checkpoint;
    }
    Ok(())
}

pub fn process_registry_updates<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    spec: &NetworkSpec,
) -> anyhow::Result<()> {
    let current_epoch = state.get_current_epoch();

    // Process activation eligibility and ejections
    let mut newly_eligible = vec![];
    let mut ejections = vec![];
    for (index, validator) in state.validators().iter().enumerate() {
        if validator.is_eligible_for_activation_queue() {
            newly_eligible.push(index);
        }
        if validator.is_active_validator(current_epoch)
            && validator.effective_balance <= spec.ejection_balance
        {
            ejections.push(index as u64);
        }
    }
    for index in newly_eligible {
        let validator = state
            .validators_mut()
            .get_mut(index)
            .ok_or_else(|| anyhow!("Validator {index} not found"))?;
        validator.activation_eligibility_epoch = current_epoch + 1;
    }
    for index in ejections {
        initiate_validator_exit(state, index, spec)?;
    }

    // Queue validators eligible for activation and not yet dequeued for activation
    let finalized_epoch = state.finalized_checkpoint().epoch;
    // Order by the sequence of activation_eligibility_epoch setting and then index
    let activation_queue = state
        .validators()
        .iter()
        .enumerate()
        .filter(|(_, validator)| validator.is_eligible_for_activation(finalized_epoch))
        .map(|(index, validator)| (validator.activation_eligibility_epoch, index))
        .sorted_unstable();

    // Dequeued validators for activation up to churn limit
    let churn_limit = state.get_validator_churn_limit(spec) as usize;
    let activation_epoch = compute_activation_exit_epoch(current_epoch);
    for (_, index) in activation_queue.take(churn_limit) {
        let validator = state
            .validators_mut()
            .get_mut(index)
            .ok_or_else(|| anyhow!("Validator {index} not found"))?;
        validator.activation_epoch = activation_epoch;
    }
    Ok(())
}

pub fn process_slashings<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    cache: &EpochTransitionCache,
) -> anyhow::Result<()> {
    let epoch = cache.current_epoch;
    let total_balance = cache.total_active_balance;
    let adjusted_total_slashing_balance = (state.slashings().iter().sum::<u64>()
        * proportional_slashing_multiplier::<P>(state.fork_name()))
    .min(total_balance);

    let penalties = state
        .validators()
        .iter()
        .enumerate()
        .filter(|(_, validator)| {
            validator.slashed
                && epoch + P::EPOCHS_PER_SLASHINGS_VECTOR / 2 == validator.withdrawable_epoch
        })
        .map(|(index, validator)| {
            let increment = EFFECTIVE_BALANCE_INCREMENT;
            // Factored out from penalty numerator to avoid uint64 overflow
            let penalty_numerator =
                validator.effective_balance / increment * adjusted_total_slashing_balance;
            (index as u64, penalty_numerator / total_balance * increment)
        })
        .collect::<Vec<_>>();
    for (index, penalty) in penalties {
        decrease_balance(state, index, penalty)?;
    }
    Ok(())
}

pub fn process_eth1_data_reset<P: Preset, S: BeaconStateView<P>>(state: &mut S) {
    let next_epoch = state.get_current_epoch() + 1;
    // Reset eth1 data votes
    if next_epoch % P::EPOCHS_PER_ETH1_VOTING_PERIOD == 0 {
        state.eth1_data_votes_mut().clear();
    }
}

pub fn process_effective_balance_updates<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
) -> anyhow::Result<()> {
    // Only touch validators whose effective balance moves, the rest stay shared
    let updates = state
        .validators()
        .iter()
        .zip(state.balances().iter())
        .enumerate()
        .filter_map(|(index, (validator, &balance))| {
            let effective_balance =
                compute_effective_balance(balance, validator.effective_balance);
            (effective_balance != validator.effective_balance).then_some((index, effective_balance))
        })
        .collect::<Vec<_>>();
    for (index, effective_balance) in updates {
        state
            .validators_mut()
            .get_mut(index)
            .ok_or_else(|| anyhow!("Validator {index} not found"))?
            .effective_balance = effective_balance;
    }
    Ok(())
}

pub fn process_slashings_reset<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
) -> anyhow::Result<()> {
    let next_epoch = state.get_current_epoch() + 1;
    // Reset slashings
    state
        .slashings_mut()
        .set((next_epoch % P::EPOCHS_PER_SLASHINGS_VECTOR) as usize, 0)?;
    Ok(())
}

pub fn process_randao_mixes_reset<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
) -> anyhow::Result<()> {
    let current_epoch = state.get_current_epoch();
    let next_epoch = current_epoch + 1;
    // Set randao mix
    let mix = state.get_randao_mix(current_epoch);
    state
        .randao_mixes_mut()
        .set((next_epoch % P::EPOCHS_PER_HISTORICAL_VECTOR) as usize, mix)?;
    Ok(())
}

pub fn process_historical_roots_update<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
) -> anyhow::Result<()> {
    // Set historical root accumulator
    let next_epoch = state.get_current_epoch() + 1;
    if next_epoch % (P::SLOTS_PER_HISTORICAL_ROOT / P::SLOTS_PER_EPOCH) == 0 {
        let historical_batch = HistoricalBatch::<P> {
            block_roots: state.block_roots().clone(),
            state_roots: state.state_roots().clone(),
        };
        state
            .historical_roots_mut()
            .push(historical_batch.tree_hash_root())?;
    }
    Ok(())
}
