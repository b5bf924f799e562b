use ember_consensus::{
    bellatrix::{
        beacon_block::{BeaconBlock, BeaconBlockBody},
        beacon_state::BeaconState,
    },
    execution_payload::{ExecutionPayload, ExecutionPayloadHeader},
    preset::Preset,
    view::BeaconStateView,
};
use ember_execution_engine::{ExecutionEngine, PayloadStatus};
use ember_network_spec::NetworkSpec;
use tracing::{debug, warn};

use super::{
    Operations, altair::process_attestation, altair::process_sync_aggregate,
    process_block_header, process_eth1_data, process_operations, process_randao,
};
use crate::{
    errors::{BlockProcessingError, ExecutionPayloadError},
    signature_collector::SignatureCollector,
};

pub fn process_block<P: Preset, E: ExecutionEngine<P>>(
    state: &mut BeaconState<P>,
    block: &BeaconBlock<P>,
    signatures: &mut SignatureCollector,
    engine: &E,
    spec: &NetworkSpec,
) -> Result<(), BlockProcessingError> {
    let body = &block.body;
    process_block_header(state, &block.block_header())?;
    if is_execution_enabled(state, body) {
        process_execution_payload(state, &body.execution_payload, engine, spec)?;
    }
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

pub fn is_merge_transition_complete<P: Preset>(state: &BeaconState<P>) -> bool {
    state.latest_execution_payload_header != ExecutionPayloadHeader::default()
}

pub fn is_merge_transition_block<P: Preset>(
    state: &BeaconState<P>,
    body: &BeaconBlockBody<P>,
) -> bool {
    !is_merge_transition_complete(state) && body.execution_payload != ExecutionPayload::default()
}

pub fn is_execution_enabled<P: Preset>(state: &BeaconState<P>, body: &BeaconBlockBody<P>) -> bool {
    is_merge_transition_block(state, body) || is_merge_transition_complete(state)
}

pub fn process_execution_payload<P: Preset, E: ExecutionEngine<P>>(
    state: &mut BeaconState<P>,
    payload: &ExecutionPayload<P>,
    engine: &E,
    spec: &NetworkSpec,
) -> Result<(), ExecutionPayloadError> {
    // Verify consistency of the parent hash with respect to the previous execution payload
    // header
    if is_merge_transition_complete(state) {
        let expected = state.latest_execution_payload_header.block_hash;
        if payload.parent_hash != expected {
            return Err(ExecutionPayloadError::ParentHashMismatch {
                actual: payload.parent_hash,
                expected,
            });
        }
    }

    // Verify prev_randao
    let expected = state.get_randao_mix(state.get_current_epoch());
    if payload.prev_randao != expected {
        return Err(ExecutionPayloadError::PrevRandaoMismatch {
            actual: payload.prev_randao,
            expected,
        });
    }

    // Verify timestamp
    let expected = state.genesis_time + state.slot * spec.seconds_per_slot;
    if payload.timestamp != expected {
        return Err(ExecutionPayloadError::TimestampMismatch {
            actual: payload.timestamp,
            expected,
        });
    }

    // Verify the execution payload is valid
    match engine.notify_new_payload(payload) {
        Ok(PayloadStatus::Valid) => {}
        Ok(PayloadStatus::Syncing) => warn!(
            block_hash = ?payload.block_hash,
            "Importing execution payload optimistically, engine is syncing"
        ),
        Ok(PayloadStatus::Invalid) => {
            return Err(ExecutionPayloadError::InvalidPayload(payload.block_hash));
        }
        Err(err) => return Err(ExecutionPayloadError::Engine(err)),
    }

    // Cache execution payload header
    state.latest_execution_payload_header = payload.to_execution_payload_header();
    debug!(
        block_hash = ?payload.block_hash,
        block_number = payload.block_number,
        "Processed execution payload"
    );
    Ok(())
}
