use std::collections::HashMap;

use anyhow::anyhow;
use ember_bls::BLSSignature;
use ember_consensus::{
    altair::{beacon_block::BeaconBlock, beacon_state::BeaconState},
    attestation::Attestation,
    constants::{
        EFFECTIVE_BALANCE_INCREMENT, PARTICIPATION_FLAG_WEIGHTS, PROPOSER_WEIGHT,
        SYNC_REWARD_WEIGHT, WEIGHT_DENOMINATOR,
    },
    preset::Preset,
    sync_committee::SyncAggregate,
    view::{BeaconStateView, PostAltairBeaconState, add_flag, has_flag},
};
use ember_network_spec::NetworkSpec;
use tracing::trace;

use super::{
    Operations, process_block_header, process_eth1_data, process_operations, process_randao,
    validate_attestation_data,
};
use crate::{
    errors::{AttestationError, BlockProcessingError, SyncAggregateError},
    mutators::{decrease_balance, increase_balance},
    signature_collector::SignatureCollector,
    signature_sets::sync_aggregate_signature_set,
    slashing::is_valid_indexed_attestation,
};

pub fn process_block<P: Preset>(
    state: &mut BeaconState<P>,
    block: &BeaconBlock<P>,
    signatures: &mut SignatureCollector,
    spec: &NetworkSpec,
) -> Result<(), BlockProcessingError> {
    let body = &block.body;
    process_block_header(state, &block.block_header())?;
    process_randao(state, &body.randao_reveal, signatures)?;
    process_eth1_data(state, &body.eth1_data)?;
    process_operations(
        state,
        Operations {
            proposer_slashings: &body.proposer_slashings,
            attester_slashings: &body.attester_slashings,
            attestations: &body.attestations,
            deposits: &body.deposits,
            voluntary_exits: &body.voluntary_exits,
        },
        signatures,
        spec,
        process_attestation,
    )?;
    process_sync_aggregate(state, &body.sync_aggregate, signatures)?;
    Ok(())
}

/// Sets the participation flags the attestation earns and pays the proposer for every flag
/// newly set.
pub fn process_attestation<P: Preset, S: PostAltairBeaconState<P>>(
    state: &mut S,
    attestation: &Attestation<P>,
    signatures: &mut SignatureCollector,
) -> Result<(), AttestationError> {
    let data = &attestation.data;
    validate_attestation_data(state, data)?;

    // Participation flag indices
    let participation_flag_indices =
        state.get_attestation_participation_flag_indices(data, state.slot() - data.slot)?;

    // Verify signature
    let indexed_attestation = state.get_indexed_attestation(attestation)?;
    is_valid_indexed_attestation(state, &indexed_attestation, signatures)?;

    let base_reward_per_increment = state.get_base_reward_per_increment()?;
    let effective_balances = indexed_attestation
        .attesting_indices
        .iter()
        .map(|&index| {
            state
                .validators()
                .get(index as usize)
                .map(|validator| validator.effective_balance)
                .ok_or_else(|| anyhow!("Validator {index} not found"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    // Update epoch participation flags
    let is_current = data.target.epoch == state.get_current_epoch();
    let epoch_participation = if is_current {
        state.current_epoch_participation_mut()
    } else {
        state.previous_epoch_participation_mut()
    };
    let mut proposer_reward_numerator = 0;
    for (&index, effective_balance) in indexed_attestation
        .attesting_indices
        .iter()
        .zip(effective_balances)
    {
        let flags = epoch_participation
            .get_mut(index as usize)
            .ok_or_else(|| anyhow!("No participation record for validator {index}"))?;
        let base_reward =
            effective_balance / EFFECTIVE_BALANCE_INCREMENT * base_reward_per_increment;
        for (flag_index, weight) in PARTICIPATION_FLAG_WEIGHTS.iter().enumerate() {
            let flag_index = flag_index as u8;
            if participation_flag_indices.contains(&flag_index) && !has_flag(*flags, flag_index)
            {
                *flags = add_flag(*flags, flag_index);
                proposer_reward_numerator += base_reward * weight;
            }
        }
    }

    // Reward proposer
    let proposer_reward_denominator =
        (WEIGHT_DENOMINATOR - PROPOSER_WEIGHT) * WEIGHT_DENOMINATOR / PROPOSER_WEIGHT;
    let proposer_reward = proposer_reward_numerator / proposer_reward_denominator;
    let proposer_index = state.get_beacon_proposer_index()?;
    increase_balance(state, proposer_index, proposer_reward)?;
    Ok(())
}

pub fn process_sync_aggregate<P: Preset, S: PostAltairBeaconState<P>>(
    state: &mut S,
    sync_aggregate: &SyncAggregate<P>,
    signatures: &mut SignatureCollector,
) -> Result<(), SyncAggregateError> {
    // Verify sync committee aggregate signature signing over the previous slot block root
    let previous_slot = state.slot().max(1) - 1;
    let block_root = state.get_block_root_at_slot(previous_slot)?;
    match sync_aggregate_signature_set(state, sync_aggregate, block_root)? {
        Some(set) => signatures.push(set),
        None => {
            if sync_aggregate.sync_committee_signature != BLSSignature::infinity() {
                return Err(SyncAggregateError::NonEmptySignature);
            }
        }
    }

    // Compute participant and proposer rewards
    let total_active_increments = state.get_total_active_balance()? / EFFECTIVE_BALANCE_INCREMENT;
    let total_base_rewards = state.get_base_reward_per_increment()? * total_active_increments;
    let max_participant_rewards =
        total_base_rewards * SYNC_REWARD_WEIGHT / WEIGHT_DENOMINATOR / P::SLOTS_PER_EPOCH;
    let participant_reward = max_participant_rewards / P::SYNC_COMMITTEE_SIZE;
    let proposer_reward =
        participant_reward * PROPOSER_WEIGHT / (WEIGHT_DENOMINATOR - PROPOSER_WEIGHT);

    // Apply participant and proposer rewards
    let pubkey_to_index = state
        .validators()
        .iter()
        .enumerate()
        .map(|(index, validator)| (validator.pubkey.clone(), index as u64))
        .collect::<HashMap<_, _>>();
    let committee_indices = state
        .current_sync_committee()
        .pubkeys
        .iter()
        .map(|pubkey| {
            pubkey_to_index
                .get(pubkey)
                .copied()
                .ok_or_else(|| anyhow!("Sync committee member {pubkey:?} is not a validator"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let proposer_index = state.get_beacon_proposer_index()?;
    let mut participants = 0;
    for (participant_index, participated) in committee_indices
        .into_iter()
        .zip(sync_aggregate.sync_committee_bits.iter())
    {
        if participated {
            participants += 1;
            increase_balance(state, participant_index, participant_reward)?;
            increase_balance(state, proposer_index, proposer_reward)?;
        } else {
            decrease_balance(state, participant_index, participant_reward)?;
        }
    }

    trace!(
        slot = state.slot(),
        participants,
        participant_reward,
        "Processed sync aggregate"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use ember_consensus::{beacon_state::BeaconState as AnyBeaconState, preset::Minimal};
    use ember_network_spec::ForkName;
    use ssz_types::BitVector;

    use super::*;
    use crate::test_utils::{
        advance, altair_state, full_attestations, full_sync_aggregate, spec_for,
    };

    const GWEI: u64 = 1_000_000_000;

    fn state_at(slot: u64) -> BeaconState<Minimal> {
        let spec = spec_for(ForkName::Altair);
        let AnyBeaconState::Altair(state) =
            advance(AnyBeaconState::from(altair_state(64)), slot, &spec)
        else {
            panic!("altair state expected");
        };
        state
    }

    #[test]
    fn timely_attestation_sets_every_flag_once() {
        let mut state = state_at(5);
        let attestations = full_attestations(&state, 4);
        let proposer = state.get_beacon_proposer_index().expect("proposer");
        let proposer_balance = *state.balances.get(proposer as usize).expect("exists");

        let mut signatures = SignatureCollector::new();
        for attestation in &attestations {
            process_attestation(&mut state, attestation, &mut signatures)
                .expect("valid attestation");
        }
        assert!(signatures.verify().is_ok());

        let attesters = attestations
            .iter()
            .flat_map(|attestation| {
                state
                    .get_attesting_indices(&attestation.data, &attestation.aggregation_bits)
                    .expect("committee")
            })
            .collect::<Vec<_>>();
        for index in &attesters {
            let flags = *state
                .current_epoch_participation
                .get(*index as usize)
                .expect("participation");
            assert_eq!(flags, 0b111, "validator {index}");
        }
        let rewarded = *state.balances.get(proposer as usize).expect("exists");
        assert!(rewarded > proposer_balance);

        // The same attestations again set no new flags and pay nothing more.
        for attestation in &attestations {
            process_attestation(&mut state, attestation, &mut SignatureCollector::disabled())
                .expect("valid attestation");
        }
        assert_eq!(*state.balances.get(proposer as usize).expect("exists"), rewarded);
    }

    #[test]
    fn late_attestation_misses_the_head_flag() {
        let mut state = state_at(5);
        let attestations = full_attestations(&state, 3);
        for attestation in &attestations {
            process_attestation(&mut state, attestation, &mut SignatureCollector::disabled())
                .expect("valid attestation");
        }
        let index = state
            .get_attesting_indices(&attestations[0].data, &attestations[0].aggregation_bits)
            .expect("committee")
            .into_iter()
            .next()
            .expect("non-empty committee");
        let flags = *state
            .current_epoch_participation
            .get(index as usize)
            .expect("participation");
        assert_eq!(flags, 0b011);
    }

    #[test]
    fn sync_aggregate_rewards_participants() {
        let mut state = state_at(3);
        let sync_aggregate = full_sync_aggregate(&state);
        let total_before: u64 = state.balances.iter().sum();

        let mut signatures = SignatureCollector::new();
        process_sync_aggregate(&mut state, &sync_aggregate, &mut signatures)
            .expect("valid aggregate");
        assert_eq!(signatures.len(), 1);
        assert!(signatures.verify().is_ok());
        assert!(state.balances.iter().sum::<u64>() > total_before);
    }

    #[test]
    fn empty_sync_aggregate_penalizes_and_needs_infinity_signature() {
        let mut state = state_at(3);
        let before = state.clone();

        let empty = SyncAggregate::<Minimal>::default();
        let mut signatures = SignatureCollector::new();
        process_sync_aggregate(&mut state, &empty, &mut signatures).expect("empty aggregate");
        assert!(signatures.is_empty());
        let member = state
            .current_sync_committee
            .pubkeys
            .first()
            .and_then(|pubkey| state.validators.iter().position(|v| &v.pubkey == pubkey))
            .expect("committee member");
        assert!(
            state.balances.get(member).expect("exists")
                < before.balances.get(member).expect("exists")
        );
        assert!(*state.balances.get(member).expect("exists") < 32 * GWEI);

        let mut state = before;
        let forged = SyncAggregate::<Minimal> {
            sync_committee_bits: BitVector::new(),
            sync_committee_signature: BLSSignature::default(),
        };
        assert!(matches!(
            process_sync_aggregate(&mut state, &forged, &mut SignatureCollector::new()),
            Err(SyncAggregateError::NonEmptySignature)
        ));
    }
}
