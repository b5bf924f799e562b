use std::sync::Arc;

use ember_consensus::{
    altair, bellatrix,
    execution_payload::ExecutionPayloadHeader,
    fork::Fork,
    pending_attestation::PendingAttestation,
    phase0,
    preset::Preset,
    view::{BeaconStateView, PostAltairBeaconState, add_flag},
};
use ember_network_spec::NetworkSpec;
use ember_persistent::PersistentList;
use tracing::info;

pub fn upgrade_to_altair<P: Preset>(
    pre: phase0::beacon_state::BeaconState<P>,
    spec: &NetworkSpec,
) -> anyhow::Result<altair::beacon_state::BeaconState<P>> {
    let epoch = pre.get_current_epoch();
    let validator_count = pre.validators.len();
    let previous_epoch_attestations = pre.previous_epoch_attestations.clone();

    let mut post = altair::beacon_state::BeaconState {
        genesis_time: pre.genesis_time,
        genesis_validators_root: pre.genesis_validators_root,
        slot: pre.slot,
        fork: Fork {
            previous_version: pre.fork.current_version,
            current_version: spec.altair_fork_version,
            epoch,
        },
        latest_block_header: pre.latest_block_header,
        block_roots: pre.block_roots,
        state_roots: pre.state_roots,
        historical_roots: pre.historical_roots,
        eth1_data: pre.eth1_data,
        eth1_data_votes: pre.eth1_data_votes,
        eth1_deposit_index: pre.eth1_deposit_index,
        validators: pre.validators,
        balances: pre.balances,
        randao_mixes: pre.randao_mixes,
        slashings: pre.slashings,
        previous_epoch_participation: PersistentList::new(vec![0; validator_count])?,
        current_epoch_participation: PersistentList::new(vec![0; validator_count])?,
        justification_bits: pre.justification_bits,
        previous_justified_checkpoint: pre.previous_justified_checkpoint,
        current_justified_checkpoint: pre.current_justified_checkpoint,
        finalized_checkpoint: pre.finalized_checkpoint,
        inactivity_scores: PersistentList::new(vec![0; validator_count])?,
        current_sync_committee: Arc::default(),
        next_sync_committee: Arc::default(),
    };

    translate_participation(&mut post, previous_epoch_attestations.iter())?;

    // The first two sync committees are the same.
    let sync_committee = Arc::new(post.get_next_sync_committee()?);
    post.current_sync_committee = sync_committee.clone();
    post.next_sync_committee = sync_committee;

    info!(epoch, "Upgraded state to altair");
    Ok(post)
}

/// Carries the phase0 pending attestations over as previous epoch participation flags.
fn translate_participation<'a, P: Preset>(
    state: &mut altair::beacon_state::BeaconState<P>,
    pending_attestations: impl Iterator<Item = &'a PendingAttestation<P>>,
) -> anyhow::Result<()> {
    for attestation in pending_attestations {
        let flag_indices = state.get_attestation_participation_flag_indices(
            &attestation.data,
            attestation.inclusion_delay,
        )?;
        let attesting_indices =
            state.get_attesting_indices(&attestation.data, &attestation.aggregation_bits)?;
        for index in attesting_indices {
            let Some(flags) = state.previous_epoch_participation.get_mut(index as usize) else {
                continue;
            };
            for &flag_index in &flag_indices {
                *flags = add_flag(*flags, flag_index);
            }
        }
    }
    Ok(())
}

pub fn upgrade_to_bellatrix<P: Preset>(
    pre: altair::beacon_state::BeaconState<P>,
    spec: &NetworkSpec,
) -> anyhow::Result<bellatrix::beacon_state::BeaconState<P>> {
    let epoch = pre.get_current_epoch();
    let post = bellatrix::beacon_state::BeaconState {
        genesis_time: pre.genesis_time,
        genesis_validators_root: pre.genesis_validators_root,
        slot: pre.slot,
        fork: Fork {
            previous_version: pre.fork.current_version,
            current_version: spec.bellatrix_fork_version,
            epoch,
        },
        latest_block_header: pre.latest_block_header,
        block_roots: pre.block_roots,
        state_roots: pre.state_roots,
        historical_roots: pre.historical_roots,
        eth1_data: pre.eth1_data,
        eth1_data_votes: pre.eth1_data_votes,
        eth1_deposit_index: pre.eth1_deposit_index,
        validators: pre.validators,
        balances: pre.balances,
        randao_mixes: pre.randao_mixes,
        slashings: pre.slashings,
        previous_epoch_participation: pre.previous_epoch_participation,
        current_epoch_participation: pre.current_epoch_participation,
        justification_bits: pre.justification_bits,
        previous_justified_checkpoint: pre.previous_justified_checkpoint,
        current_justified_checkpoint: pre.current_justified_checkpoint,
        finalized_checkpoint: pre.finalized_checkpoint,
        inactivity_scores: pre.inactivity_scores,
        current_sync_committee: pre.current_sync_committee,
        next_sync_committee: pre.next_sync_committee,
        latest_execution_payload_header: ExecutionPayloadHeader::default(),
    };

    info!(epoch, "Upgraded state to bellatrix");
    Ok(post)
}

#[cfg(test)]
mod tests {
    use ember_consensus::preset::Minimal;
    use ember_network_spec::{ForkName, MINIMAL};
    use tree_hash::TreeHash;

    use super::*;
    use crate::test_utils::phase0_state;

    #[test]
    fn altair_upgrade_keeps_registry_and_builds_sync_committees() {
        let pre = phase0_state(32);
        let validators_root = pre.validators.tree_hash_root();
        let post = upgrade_to_altair(pre.clone(), &MINIMAL).expect("upgrades");

        assert_eq!(post.fork_name(), ForkName::Altair);
        assert_eq!(post.fork.previous_version, pre.fork.current_version);
        assert_eq!(post.fork.current_version, MINIMAL.altair_fork_version);
        assert_eq!(post.validators.tree_hash_root(), validators_root);
        assert!(post.validators.ptr_eq(&pre.validators));
        assert_eq!(post.inactivity_scores.len(), 32);
        assert!(post.previous_epoch_participation.iter().all(|&flags| flags == 0));
        assert_eq!(post.current_sync_committee, post.next_sync_committee);
        assert_eq!(
            post.current_sync_committee.pubkeys.len() as u64,
            Minimal::SYNC_COMMITTEE_SIZE
        );
    }

    #[test]
    fn bellatrix_upgrade_starts_before_the_merge() {
        let altair = upgrade_to_altair(phase0_state(32), &MINIMAL).expect("upgrades");
        let post = upgrade_to_bellatrix(altair.clone(), &MINIMAL).expect("upgrades");

        assert_eq!(post.fork.previous_version, MINIMAL.altair_fork_version);
        assert_eq!(post.fork.current_version, MINIMAL.bellatrix_fork_version);
        assert_eq!(
            post.latest_execution_payload_header,
            ExecutionPayloadHeader::default()
        );
        assert!(Arc::ptr_eq(
            &post.current_sync_committee,
            &altair.current_sync_committee
        ));
    }
}
