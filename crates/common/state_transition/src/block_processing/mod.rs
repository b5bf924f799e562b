//! Block processing steps shared by every fork, plus the fork dispatch at the top.

pub mod altair;
pub mod bellatrix;
pub mod phase0;

use alloy_primitives::B256;
use anyhow::anyhow;
use ember_bls::BLSSignature;
use ember_consensus::{
    attestation::Attestation,
    attestation_data::AttestationData,
    attester_slashing::AttesterSlashing,
    beacon_block::SignedBeaconBlock,
    beacon_block_header::BeaconBlockHeader,
    beacon_state::BeaconState,
    constants::{
        EFFECTIVE_BALANCE_INCREMENT, MAX_EFFECTIVE_BALANCE, MIN_ATTESTATION_INCLUSION_DELAY,
    },
    deposit::Deposit,
    eth_1_data::Eth1Data,
    misc::{compute_epoch_at_slot, xor},
    preset::Preset,
    proposer_slashing::ProposerSlashing,
    validator::Validator,
    view::BeaconStateView,
    voluntary_exit::SignedVoluntaryExit,
};
use ember_execution_engine::ExecutionEngine;
use ember_network_spec::NetworkSpec;
use ethereum_hashing::hash;
use tracing::{debug, warn};
use tree_hash::TreeHash;

use crate::{
    errors::{AttestationError, BlockProcessingError, DepositError},
    mutators::increase_balance,
    signature_collector::SignatureCollector,
    signature_sets::{deposit_signature_set, randao_signature_set},
    slashing::{process_attester_slashing, process_proposer_slashing, process_voluntary_exit},
};

/// Applies `signed_block` to a state already advanced to the block's slot.
///
/// Signatures met along the way are pushed to `signatures` rather than checked.
pub fn process_block<P: Preset, E: ExecutionEngine<P>>(
    state: &mut BeaconState<P>,
    signed_block: &SignedBeaconBlock<P>,
    signatures: &mut SignatureCollector,
    engine: &E,
    spec: &NetworkSpec,
) -> Result<(), BlockProcessingError> {
    match (state, signed_block) {
        (BeaconState::Phase0(state), SignedBeaconBlock::Phase0(block)) => {
            phase0::process_block(state, &block.message, signatures, spec)
        }
        (BeaconState::Altair(state), SignedBeaconBlock::Altair(block)) => {
            altair::process_block(state, &block.message, signatures, spec)
        }
        (BeaconState::Bellatrix(state), SignedBeaconBlock::Bellatrix(block)) => {
            bellatrix::process_block(state, &block.message, signatures, engine, spec)
        }
        (state, block) => Err(BlockProcessingError::ForkMismatch {
            block: block.fork_name(),
            state: state.fork_name(),
        }),
    }
}

pub fn process_block_header<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    header: &BeaconBlockHeader,
) -> Result<(), BlockProcessingError> {
    // Verify that the slots match
    if header.slot != state.slot() {
        return Err(BlockProcessingError::SlotMismatch {
            block: header.slot,
            state: state.slot(),
        });
    }

    // Verify that the block is newer than latest block header
    let latest_slot = state.latest_block_header().slot;
    if header.slot <= latest_slot {
        return Err(BlockProcessingError::BlockNotNewer {
            block: header.slot,
            latest: latest_slot,
        });
    }

    // Verify that proposer index is the correct index
    let expected = state.get_beacon_proposer_index()?;
    if header.proposer_index != expected {
        return Err(BlockProcessingError::ProposerIndexMismatch {
            actual: header.proposer_index,
            expected,
        });
    }

    // Verify that the parent matches
    let latest_root = state.latest_block_header().tree_hash_root();
    if header.parent_root != latest_root {
        return Err(BlockProcessingError::ParentRootMismatch {
            actual: header.parent_root,
            expected: latest_root,
        });
    }

    // Cache current block as the new latest block, the state root is filled in on the next
    // slot
    *state.latest_block_header_mut() = BeaconBlockHeader {
        slot: header.slot,
        proposer_index: header.proposer_index,
        parent_root: header.parent_root,
        state_root: B256::ZERO,
        body_root: header.body_root,
    };

    // Verify proposer is not slashed
    let proposer = state
        .validators()
        .get(header.proposer_index as usize)
        .ok_or_else(|| anyhow!("Proposer {} not found", header.proposer_index))?;
    if proposer.slashed {
        return Err(BlockProcessingError::ProposerSlashed(header.proposer_index));
    }

    Ok(())
}

pub fn process_randao<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    randao_reveal: &BLSSignature,
    signatures: &mut SignatureCollector,
) -> Result<(), BlockProcessingError> {
    let epoch = state.get_current_epoch();
    let proposer_index = state.get_beacon_proposer_index()?;
    signatures.push_with(|| randao_signature_set(&*state, proposer_index, randao_reveal))?;

    // Mix in RANDAO reveal
    let mix = xor(
        state.get_randao_mix(epoch).as_slice(),
        hash(randao_reveal.to_bytes()).as_slice(),
    );
    state
        .randao_mixes_mut()
        .set((epoch % P::EPOCHS_PER_HISTORICAL_VECTOR) as usize, mix)
        .map_err(|err| anyhow!("Failed to set randao mix: {err}"))?;
    Ok(())
}

pub fn process_eth1_data<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    eth1_data: &Eth1Data,
) -> Result<(), BlockProcessingError> {
    state
        .eth1_data_votes_mut()
        .push(eth1_data.clone())
        .map_err(|err| anyhow!("Can't push eth1 data vote: {err}"))?;

    let count = state
        .eth1_data_votes()
        .iter()
        .filter(|vote| *vote == eth1_data)
        .count() as u64;
    if count * 2 > P::SLOTS_PER_ETH1_VOTING_PERIOD {
        *state.eth1_data_mut() = eth1_data.clone();
    }
    Ok(())
}

/// The operation lists of a block body, borrowed from whichever fork's body holds them.
pub struct Operations<'a, P: Preset> {
    pub proposer_slashings: &'a [ProposerSlashing],
    pub attester_slashings: &'a [AttesterSlashing<P>],
    pub attestations: &'a [Attestation<P>],
    pub deposits: &'a [Deposit],
    pub voluntary_exits: &'a [SignedVoluntaryExit],
}

/// Runs every operation of a block in order. Attestations are handed to
/// `process_attestation` since their effect on the state differs per fork.
pub fn process_operations<P, S, F>(
    state: &mut S,
    operations: Operations<'_, P>,
    signatures: &mut SignatureCollector,
    spec: &NetworkSpec,
    mut process_attestation: F,
) -> Result<(), BlockProcessingError>
where
    P: Preset,
    S: BeaconStateView<P>,
    F: FnMut(&mut S, &Attestation<P>, &mut SignatureCollector) -> Result<(), AttestationError>,
{
    // Verify that outstanding deposits are processed up to the maximum number of deposits
    let expected = P::MAX_DEPOSITS.min(
        state
            .eth1_data()
            .pending_deposit_count(state.eth1_deposit_index()),
    );
    let actual = operations.deposits.len() as u64;
    if actual != expected {
        return Err(BlockProcessingError::DepositCountMismatch { actual, expected });
    }

    for (index, proposer_slashing) in operations.proposer_slashings.iter().enumerate() {
        process_proposer_slashing(state, proposer_slashing, signatures, spec)
            .map_err(|reason| BlockProcessingError::ProposerSlashing { index, reason })?;
    }
    for (index, attester_slashing) in operations.attester_slashings.iter().enumerate() {
        process_attester_slashing(state, attester_slashing, signatures, spec)
            .map_err(|reason| BlockProcessingError::AttesterSlashing { index, reason })?;
    }
    for (index, attestation) in operations.attestations.iter().enumerate() {
        process_attestation(&mut *state, attestation, signatures)
            .map_err(|reason| BlockProcessingError::Attestation { index, reason })?;
    }
    for (index, deposit) in operations.deposits.iter().enumerate() {
        process_deposit(state, deposit, spec)
            .map_err(|reason| BlockProcessingError::Deposit { index, reason })?;
    }
    for (index, voluntary_exit) in operations.voluntary_exits.iter().enumerate() {
        process_voluntary_exit(state, voluntary_exit, signatures, spec)
            .map_err(|reason| BlockProcessingError::VoluntaryExit { index, reason })?;
    }

    debug!(
        slot = state.slot(),
        proposer_slashings = operations.proposer_slashings.len(),
        attester_slashings = operations.attester_slashings.len(),
        attestations = operations.attestations.len(),
        deposits = operations.deposits.len(),
        voluntary_exits = operations.voluntary_exits.len(),
        "Processed block operations"
    );
    Ok(())
}

/// Checks of an attestation's data common to every fork.
pub fn validate_attestation_data<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    data: &AttestationData,
) -> Result<(), AttestationError> {
    let previous = state.get_previous_epoch();
    let current = state.get_current_epoch();
    if data.target.epoch != previous && data.target.epoch != current {
        return Err(AttestationError::BadTargetEpoch {
            target: data.target.epoch,
            previous,
            current,
        });
    }
    if data.target.epoch != compute_epoch_at_slot::<P>(data.slot) {
        return Err(AttestationError::TargetEpochSlotMismatch {
            target: data.target.epoch,
            slot: data.slot,
        });
    }

    let state_slot = state.slot();
    if data.slot + MIN_ATTESTATION_INCLUSION_DELAY > state_slot {
        return Err(AttestationError::IncludedTooEarly {
            slot: data.slot,
            state_slot,
        });
    }
    if state_slot > data.slot + P::SLOTS_PER_EPOCH {
        return Err(AttestationError::IncludedTooLate {
            slot: data.slot,
            state_slot,
        });
    }

    let count = state.get_committee_count_per_slot(data.target.epoch);
    if data.index >= count {
        return Err(AttestationError::BadCommitteeIndex {
            index: data.index,
            count,
        });
    }

    let justified = if data.target.epoch == current {
        state.current_justified_checkpoint()
    } else {
        state.previous_justified_checkpoint()
    };
    if data.source != justified {
        return Err(AttestationError::WrongSource);
    }
    Ok(())
}

pub fn process_deposit<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    deposit: &Deposit,
    spec: &NetworkSpec,
) -> Result<(), DepositError> {
    let deposit_index = state.eth1_deposit_index();
    if !deposit.is_valid_proof(state.eth1_data().deposit_root, deposit_index) {
        return Err(DepositError::InvalidProof(deposit_index));
    }

    // Deposits must be processed in order
    *state.eth1_deposit_index_mut() += 1;

    let data = &deposit.data;
    let existing = state
        .validators()
        .iter()
        .position(|validator| validator.pubkey == data.pubkey);
    match existing {
        Some(index) => increase_balance(state, index as u64, data.amount)?,
        None => {
            // Proof of possession is checked on the spot since a bad one only skips the deposit
            if !deposit_signature_set(data, spec).verify() {
                warn!(
                    deposit_index,
                    pubkey = ?data.pubkey,
                    "Skipping deposit with invalid signature"
                );
                return Ok(());
            }
            let effective_balance = (data.amount - data.amount % EFFECTIVE_BALANCE_INCREMENT)
                .min(MAX_EFFECTIVE_BALANCE);
            state.push_validator(
                Validator::from_deposit(
                    data.pubkey.clone(),
                    data.withdrawal_credentials,
                    effective_balance,
                ),
                data.amount,
            )?;
            debug!(
                deposit_index,
                validator_index = state.validators().len() - 1,
                "Added validator from deposit"
            );
        }
    }
    Ok(())
}
