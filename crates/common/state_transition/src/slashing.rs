use std::collections::BTreeSet;

use anyhow::anyhow;
use ember_consensus::{
    attestation_data::AttestationData,
    attester_slashing::AttesterSlashing,
    constants::{
        FAR_FUTURE_EPOCH, PROPOSER_REWARD_QUOTIENT, PROPOSER_WEIGHT, WEIGHT_DENOMINATOR,
        WHISTLEBLOWER_REWARD_QUOTIENT,
    },
    indexed_attestation::IndexedAttestation,
    misc::is_sorted_and_unique,
    preset::Preset,
    proposer_slashing::ProposerSlashing,
    view::BeaconStateView,
    voluntary_exit::SignedVoluntaryExit,
};
use ember_network_spec::{ForkName, NetworkSpec};
use tracing::debug;

use crate::{
    errors::{
        AttesterSlashingError, IndexedAttestationError, ProposerSlashingError, VoluntaryExitError,
    },
    mutators::{
        decrease_balance, increase_balance, initiate_validator_exit, min_slashing_penalty_quotient,
    },
    signature_collector::SignatureCollector,
    signature_sets::{
        indexed_attestation_signature_set, proposer_slashing_signature_sets,
        voluntary_exit_signature_set,
    },
};

/// Check if ``data_1`` and ``data_2`` are slashable according to Casper FFG rules.
pub fn is_slashable_attestation_data(data_1: &AttestationData, data_2: &AttestationData) -> bool {
    // Double vote
    (data_1 != data_2 && data_1.target.epoch == data_2.target.epoch)
        // Surround vote
        || (data_1.source.epoch < data_2.source.epoch
            && data_2.target.epoch < data_1.target.epoch)
}

/// Check the shape of ``indexed_attestation`` and queue its aggregate signature.
pub fn is_valid_indexed_attestation<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    indexed_attestation: &IndexedAttestation<P>,
    signatures: &mut SignatureCollector,
) -> Result<(), IndexedAttestationError> {
    let indices = &indexed_attestation.attesting_indices;
    if indices.is_empty() {
        return Err(IndexedAttestationError::EmptyIndices);
    }
    if !is_sorted_and_unique(indices) {
        return Err(IndexedAttestationError::UnsortedIndices);
    }
    let validator_count = state.validators().len() as u64;
    if let Some(&unknown) = indices.iter().find(|&&index| index >= validator_count) {
        return Err(IndexedAttestationError::UnknownValidator(unknown));
    }

    signatures.push_with(|| indexed_attestation_signature_set(state, indexed_attestation))?;
    Ok(())
}

/// Return the validators ``attester_slashing`` proves slashable, in ascending order.
pub fn validate_attester_slashing<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    attester_slashing: &AttesterSlashing<P>,
    signatures: &mut SignatureCollector,
) -> Result<Vec<u64>, AttesterSlashingError> {
    let attestation_1 = &attester_slashing.attestation_1;
    let attestation_2 = &attester_slashing.attestation_2;

    if !is_slashable_attestation_data(&attestation_1.data, &attestation_2.data) {
        return Err(AttesterSlashingError::NotSlashable);
    }
    is_valid_indexed_attestation(state, attestation_1, signatures)
        .map_err(AttesterSlashingError::InvalidAttestation1)?;
    is_valid_indexed_attestation(state, attestation_2, signatures)
        .map_err(AttesterSlashingError::InvalidAttestation2)?;

    let current_epoch = state.get_current_epoch();
    let indices_1: BTreeSet<u64> = attestation_1.attesting_indices.iter().copied().collect();
    let slashable_indices: Vec<u64> = attestation_2
        .attesting_indices
        .iter()
        .copied()
        .filter(|index| indices_1.contains(index))
        .filter(|&index| {
            state
                .validators()
                .get(index as usize)
                .is_some_and(|validator| validator.is_slashable_validator(current_epoch))
        })
        .collect();

    if slashable_indices.is_empty() {
        return Err(AttesterSlashingError::NoSlashableIndices);
    }
    Ok(slashable_indices)
}

pub fn process_attester_slashing<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    attester_slashing: &AttesterSlashing<P>,
    signatures: &mut SignatureCollector,
    spec: &NetworkSpec,
) -> Result<(), AttesterSlashingError> {
    for index in validate_attester_slashing(state, attester_slashing, signatures)? {
        slash_validator(state, index, None, spec)?;
    }
    Ok(())
}

pub fn validate_proposer_slashing<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    proposer_slashing: &ProposerSlashing,
    signatures: &mut SignatureCollector,
) -> Result<u64, ProposerSlashingError> {
    let header_1 = &proposer_slashing.signed_header_1.message;
    let header_2 = &proposer_slashing.signed_header_2.message;

    if header_1.slot != header_2.slot {
        return Err(ProposerSlashingError::SlotMismatch(header_1.slot, header_2.slot));
    }
    if header_1.proposer_index != header_2.proposer_index {
        return Err(ProposerSlashingError::ProposerMismatch(
            header_1.proposer_index,
            header_2.proposer_index,
        ));
    }
    if header_1 == header_2 {
        return Err(ProposerSlashingError::SameHeaders);
    }

    let proposer_index = header_1.proposer_index;
    let proposer = state
        .validators()
        .get(proposer_index as usize)
        .ok_or(ProposerSlashingError::UnknownValidator(proposer_index))?;
    if !proposer.is_slashable_validator(state.get_current_epoch()) {
        return Err(ProposerSlashingError::NotSlashable(proposer_index));
    }

    if signatures.is_enabled() {
        for set in proposer_slashing_signature_sets(state, proposer_slashing)? {
            signatures.push(set);
        }
    }
    Ok(proposer_index)
}

pub fn process_proposer_slashing<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    proposer_slashing: &ProposerSlashing,
    signatures: &mut SignatureCollector,
    spec: &NetworkSpec,
) -> Result<(), ProposerSlashingError> {
    let proposer_index = validate_proposer_slashing(state, proposer_slashing, signatures)?;
    slash_validator(state, proposer_index, None, spec)?;
    Ok(())
}

pub fn validate_voluntary_exit<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    signed_exit: &SignedVoluntaryExit,
    signatures: &mut SignatureCollector,
    spec: &NetworkSpec,
) -> Result<(), VoluntaryExitError> {
    let exit = &signed_exit.message;
    let index = exit.validator_index;
    let validator = state
        .validators()
        .get(index as usize)
        .ok_or(VoluntaryExitError::UnknownValidator(index))?;
    let current_epoch = state.get_current_epoch();

    if !validator.is_active_validator(current_epoch) {
        return Err(VoluntaryExitError::NotActive(index));
    }
    if validator.exit_epoch != FAR_FUTURE_EPOCH {
        return Err(VoluntaryExitError::AlreadyExited(index));
    }
    // Exits must specify an epoch when they become valid; they are not valid before then
    if current_epoch < exit.epoch {
        return Err(VoluntaryExitError::FutureEpoch {
            epoch: exit.epoch,
            current: current_epoch,
        });
    }
    let earliest = validator.activation_epoch + spec.shard_committee_period;
    if current_epoch < earliest {
        return Err(VoluntaryExitError::TooYoung {
            activation_epoch: validator.activation_epoch,
            earliest,
        });
    }

    signatures.push_with(|| voluntary_exit_signature_set(state, signed_exit))?;
    Ok(())
}

pub fn process_voluntary_exit<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    signed_exit: &SignedVoluntaryExit,
    signatures: &mut SignatureCollector,
    spec: &NetworkSpec,
) -> Result<(), VoluntaryExitError> {
    validate_voluntary_exit(state, signed_exit, signatures, spec)?;
    initiate_validator_exit(state, signed_exit.message.validator_index, spec)?;
    Ok(())
}

/// Slash the validator with index ``slashed_index``.
///
/// A validator that is already slashed is left untouched.
pub fn slash_validator<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    slashed_index: u64,
    whistleblower_index: Option<u64>,
    spec: &NetworkSpec,
) -> anyhow::Result<()> {
    let already_slashed = state
        .validators()
        .get(slashed_index as usize)
        .ok_or_else(|| anyhow!("Validator {slashed_index} not found"))?
        .slashed;
    if already_slashed {
        return Ok(());
    }

    let epoch = state.get_current_epoch();
    let fork = state.fork_name();
    initiate_validator_exit(state, slashed_index, spec)?;

    let validator = state
        .validators_mut()
        .get_mut(slashed_index as usize)
        .ok_or_else(|| anyhow!("Validator {slashed_index} not found"))?;
    validator.slashed = true;
    validator.withdrawable_epoch = validator
        .withdrawable_epoch
        .max(epoch + P::EPOCHS_PER_SLASHINGS_VECTOR);
    let effective_balance = validator.effective_balance;

    state.slashings_mut()[(epoch % P::EPOCHS_PER_SLASHINGS_VECTOR) as usize] += effective_balance;
    decrease_balance(
        state,
        slashed_index,
        effective_balance / min_slashing_penalty_quotient::<P>(fork),
    )?;

    // Apply proposer and whistleblower rewards
    let proposer_index = state.get_beacon_proposer_index()?;
    let whistleblower_index = whistleblower_index.unwrap_or(proposer_index);
    let whistleblower_reward = effective_balance / WHISTLEBLOWER_REWARD_QUOTIENT;
    let proposer_reward = match fork {
        ForkName::Phase0 => whistleblower_reward / PROPOSER_REWARD_QUOTIENT,
        ForkName::Altair | ForkName::Bellatrix => {
            whistleblower_reward * PROPOSER_WEIGHT / WEIGHT_DENOMINATOR
        }
    };
    increase_balance(state, proposer_index, proposer_reward)?;
    increase_balance(
        state,
        whistleblower_index,
        whistleblower_reward - proposer_reward,
    )?;

    debug!(
        validator = slashed_index,
        epoch,
        penalty = effective_balance / min_slashing_penalty_quotient::<P>(fork),
        "Slashed validator"
    );
    Ok(())
}
