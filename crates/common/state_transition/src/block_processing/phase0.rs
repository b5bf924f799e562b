use ember_consensus::{
    attestation::Attestation,
    pending_attestation::PendingAttestation,
    phase0::{beacon_block::BeaconBlock, beacon_state::BeaconState},
    preset::Preset,
    view::BeaconStateView,
};
use ember_network_spec::NetworkSpec;

use super::{
    Operations, process_block_header, process_eth1_data, process_operations, process_randao,
    validate_attestation_data,
};
use crate::{
    errors::{AttestationError, BlockProcessingError},
    signature_collector::SignatureCollector,
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
    )
}

/// Records the attestation as pending; rewards for it are settled at the end of the epoch.
pub fn process_attestation<P: Preset>(
    state: &mut BeaconState<P>,
    attestation: &Attestation<P>,
    signatures: &mut SignatureCollector,
) -> Result<(), AttestationError> {
    let data = &attestation.data;
    validate_attestation_data(state, data)?;

    let indexed_attestation = state.get_indexed_attestation(attestation)?;
    is_valid_indexed_attestation(state, &indexed_attestation, signatures)?;

    let pending_attestation = PendingAttestation {
        aggregation_bits: attestation.aggregation_bits.clone(),
        data: data.clone(),
        inclusion_delay: state.slot - data.slot,
        proposer_index: state.get_beacon_proposer_index()?,
    };
    let pending_attestations = if data.target.epoch == state.get_current_epoch() {
        &mut state.current_epoch_attestations
    } else {
        &mut state.previous_epoch_attestations
    };
    pending_attestations
        .push(pending_attestation)
        .map_err(anyhow::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ember_consensus::{
        beacon_state::BeaconState as AnyBeaconState, checkpoint::Checkpoint, preset::Minimal,
    };
    use ember_network_spec::MINIMAL;

    use super::*;
    use crate::test_utils::{advance, full_attestations, phase0_state};

    fn state_at(slot: u64) -> BeaconState<Minimal> {
        let state = advance(AnyBeaconState::from(phase0_state(64)), slot, &MINIMAL);
        let AnyBeaconState::Phase0(state) = state else {
            panic!("phase0 state expected");
        };
        state
    }

    #[test]
    fn attestations_are_recorded_as_pending() {
        let mut state = state_at(5);
        let attestations = full_attestations(&state, 3);
        assert!(!attestations.is_empty());

        let mut signatures = SignatureCollector::new();
        for attestation in &attestations {
            process_attestation(&mut state, attestation, &mut signatures)
                .expect("valid attestation");
        }
        assert_eq!(state.current_epoch_attestations.len(), attestations.len());
        assert!(state.previous_epoch_attestations.is_empty());
        let pending = state.current_epoch_attestations.get(0).expect("recorded");
        assert_eq!(pending.inclusion_delay, 2);
        assert_eq!(signatures.len(), attestations.len());
        assert!(signatures.verify().is_ok());
    }

    #[test]
    fn attestation_timing_is_enforced() {
        let mut state = state_at(5);
        let mut attestation = full_attestations(&state, 4).remove(0);
        let mut signatures = SignatureCollector::disabled();

        attestation.data.slot = 5;
        assert!(matches!(
            process_attestation(&mut state, &attestation, &mut signatures),
            Err(AttestationError::IncludedTooEarly { .. })
        ));

        attestation.data.slot = 4;
        attestation.data.target.epoch = 1;
        assert!(matches!(
            process_attestation(&mut state, &attestation, &mut signatures),
            Err(AttestationError::BadTargetEpoch { .. })
        ));
    }

    #[test]
    fn attestation_source_must_be_justified() {
        let mut state = state_at(5);
        let mut attestation = full_attestations(&state, 4).remove(0);
        attestation.data.source = Checkpoint {
            epoch: 0,
            root: attestation.data.beacon_block_root,
        };
        let result =
            process_attestation(&mut state, &attestation, &mut SignatureCollector::disabled());
        assert!(matches!(result, Err(AttestationError::WrongSource)));
        assert!(state.current_epoch_attestations.is_empty());
    }
}
