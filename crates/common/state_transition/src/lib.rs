pub mod block_processing;
pub mod epoch_cache;
pub mod epoch_processing;
pub mod errors;
pub mod genesis;
pub mod mutators;
pub mod signature_collector;
pub mod signature_sets;
pub mod slashing;
pub mod upgrades;

#[cfg(test)]
pub(crate) mod test_utils;

use alloy_primitives::B256;
use ember_consensus::{
    beacon_block::SignedBeaconBlock,
    beacon_state::BeaconState,
    constants::MIN_SEED_LOOKAHEAD,
    misc::compute_start_slot_at_epoch,
    preset::Preset,
    view::BeaconStateView,
};
use ember_execution_engine::ExecutionEngine;
use ember_network_spec::NetworkSpec;
use tracing::{debug, trace};
use tree_hash::TreeHash;

use crate::{
    errors::{SignatureError, StateTransitionError},
    signature_collector::SignatureCollector,
    signature_sets::block_proposal_signature_set,
    upgrades::{upgrade_to_altair, upgrade_to_bellatrix},
};

/// Which checks [`state_transition`] performs. Everything is checked by default; block
/// production turns the state root check off, replaying trusted blocks turns signatures off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransitionOptions {
    pub verify_state_root: bool,
    pub verify_proposer_signature: bool,
    pub verify_signatures: bool,
}

impl Default for StateTransitionOptions {
    fn default() -> Self {
        Self {
            verify_state_root: true,
            verify_proposer_signature: true,
            verify_signatures: true,
        }
    }
}

/// Applies `signed_block` to a copy of `state` and returns the copy.
///
/// The proposer signature and every signature met while the block is processed are
/// collected and checked in a single batch afterwards. `state` itself is never modified, so a failed
/// transition leaves the caller with the state it started from.
pub fn state_transition<P: Preset, E: ExecutionEngine<P>>(
    state: &BeaconState<P>,
    signed_block: &SignedBeaconBlock<P>,
    options: StateTransitionOptions,
    engine: &E,
    spec: &NetworkSpec,
) -> Result<BeaconState<P>, StateTransitionError> {
    let mut state = state.clone();
    let slot = signed_block.slot();

    // Process slots (including those with no blocks) since block
    process_slots(&mut state, slot, spec)?;

    let mut signatures = if options.verify_signatures {
        SignatureCollector::new()
    } else {
        SignatureCollector::disabled()
    };
    if options.verify_proposer_signature {
        signatures.push_required(block_proposal_signature_set(&state, signed_block)?);
    }

    // Process block
    block_processing::process_block(&mut state, signed_block, &mut signatures, engine, spec)?;
    let signature_sets = signatures.len();
    signatures.verify()?;

    // Verify state root
    if options.verify_state_root {
        let computed = state.tree_hash_root();
        if signed_block.state_root() != computed {
            return Err(StateTransitionError::StateRootMismatch {
                block: signed_block.state_root(),
                computed,
            });
        }
    }

    debug!(
        slot,
        block_root = ?signed_block.message_root(),
        fork = ?state.fork_name(),
        signature_sets,
        "Applied block"
    );
    Ok(state)
}

/// Advances `state` through empty slots up to `slot`, running epoch processing at every
/// epoch boundary and upgrading the state when a scheduled fork activates.
pub fn process_slots<P: Preset>(
    state: &mut BeaconState<P>,
    slot: u64,
    spec: &NetworkSpec,
) -> Result<(), StateTransitionError> {
    if state.slot() >= slot {
        return Err(StateTransitionError::SlotNotInFuture {
            state: state.slot(),
            target: slot,
        });
    }

    while state.slot() < slot {
        process_slot(state)?;
        // Process epoch on the start slot of the next epoch
        if (state.slot() + 1) % P::SLOTS_PER_EPOCH == 0 {
            epoch_processing::process_epoch(state, spec)?;
        }
        *state.slot_mut() += 1;
        if state.slot() % P::SLOTS_PER_EPOCH == 0 {
            upgrade_at_fork_epoch(state, spec).map_err(StateTransitionError::Upgrade)?;
        }
        trace!(slot = state.slot(), "Processed slot");
    }
    Ok(())
}

fn process_slot<P: Preset>(state: &mut BeaconState<P>) -> anyhow::Result<()> {
    let index = (state.slot() % P::SLOTS_PER_HISTORICAL_ROOT) as usize;
    // Cache state root
    let previous_state_root = state.tree_hash_root();
    state.state_roots_mut().set(index, previous_state_root)?;
    // Cache latest block header state root
    if state.latest_block_header().state_root == B256::ZERO {
        state.latest_block_header_mut().state_root = previous_state_root;
    }
    // Cache block root
    let previous_block_root = state.latest_block_header().tree_hash_root();
    state.block_roots_mut().set(index, previous_block_root)?;
    Ok(())
}

/// Upgrades a state sitting on the first slot of a fork epoch, repeatedly when several forks
/// share that epoch.
fn upgrade_at_fork_epoch<P: Preset>(
    state: &mut BeaconState<P>,
    spec: &NetworkSpec,
) -> anyhow::Result<()> {
    let epoch = state.get_current_epoch();
    loop {
        let upgraded = match &*state {
            BeaconState::Phase0(pre) if epoch == spec.altair_fork_epoch => {
                BeaconState::Altair(upgrade_to_altair(pre.clone(), spec)?)
            }
            BeaconState::Altair(pre) if epoch == spec.bellatrix_fork_epoch => {
                BeaconState::Bellatrix(upgrade_to_bellatrix(pre.clone(), spec)?)
            }
            _ => return Ok(()),
        };
        *state = upgraded;
    }
}

/// The block root that decided the attester shuffling of `epoch`: the root at the last slot
/// of the epoch before the seed lookahead, or the genesis block root early in the chain.
pub fn shuffling_dependent_root<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    epoch: u64,
) -> anyhow::Result<B256> {
    let decision_slot = compute_start_slot_at_epoch::<P>(epoch.saturating_sub(MIN_SEED_LOOKAHEAD))
        .saturating_sub(1);
    state.get_block_root_at_slot(decision_slot)
}
