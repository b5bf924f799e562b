//! Builders for the signature sets a block carries. Each returns the set instead of checking
//! it so callers can defer everything to one batch.

use alloy_primitives::B256;
use anyhow::anyhow;
use ember_bls::{BLSSignature, PubKey, SignatureSet};
use ember_consensus::{
    beacon_block::SignedBeaconBlock,
    beacon_block_header::SignedBeaconBlockHeader,
    constants::{
        DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER, DOMAIN_DEPOSIT, DOMAIN_RANDAO,
        DOMAIN_SYNC_COMMITTEE, DOMAIN_VOLUNTARY_EXIT,
    },
    deposit_data::DepositData,
    indexed_attestation::IndexedAttestation,
    misc::{compute_domain, compute_epoch_at_slot, compute_signing_root},
    preset::Preset,
    proposer_slashing::ProposerSlashing,
    sync_committee::SyncAggregate,
    view::{BeaconStateView, PostAltairBeaconState},
    voluntary_exit::SignedVoluntaryExit,
};
use ember_network_spec::NetworkSpec;

fn validator_pubkey<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    index: u64,
) -> anyhow::Result<PubKey> {
    state
        .validators()
        .get(index as usize)
        .map(|validator| validator.pubkey.clone())
        .ok_or_else(|| anyhow!("Validator {index} not found"))
}

pub fn block_proposal_signature_set<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    signed_block: &SignedBeaconBlock<P>,
) -> anyhow::Result<SignatureSet> {
    let domain = state.get_domain(
        DOMAIN_BEACON_PROPOSER,
        Some(compute_epoch_at_slot::<P>(signed_block.slot())),
    );
    Ok(SignatureSet::single(
        validator_pubkey(state, signed_block.proposer_index())?,
        compute_signing_root(signed_block.message_root(), domain),
        signed_block.signature().clone(),
    ))
}

fn block_header_signature_set<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    signed_header: &SignedBeaconBlockHeader,
) -> anyhow::Result<SignatureSet> {
    let domain = state.get_domain(
        DOMAIN_BEACON_PROPOSER,
        Some(compute_epoch_at_slot::<P>(signed_header.message.slot)),
    );
    Ok(SignatureSet::single(
        validator_pubkey(state, signed_header.message.proposer_index)?,
        compute_signing_root(&signed_header.message, domain),
        signed_header.signature.clone(),
    ))
}

/// The proposer's signature over the current epoch.
pub fn randao_signature_set<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    proposer_index: u64,
    randao_reveal: &BLSSignature,
) -> anyhow::Result<SignatureSet> {
    let epoch = state.get_current_epoch();
    Ok(SignatureSet::single(
        validator_pubkey(state, proposer_index)?,
        compute_signing_root(epoch, state.get_domain(DOMAIN_RANDAO, None)),
        randao_reveal.clone(),
    ))
}

pub fn indexed_attestation_signature_set<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    indexed_attestation: &IndexedAttestation<P>,
) -> anyhow::Result<SignatureSet> {
    let pubkeys = indexed_attestation
        .attesting_indices
        .iter()
        .map(|&index| validator_pubkey(state, index))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let domain = state.get_domain(
        DOMAIN_BEACON_ATTESTER,
        Some(indexed_attestation.data.target.epoch),
    );
    Ok(SignatureSet::multiple(
        pubkeys,
        compute_signing_root(&indexed_attestation.data, domain),
        indexed_attestation.signature.clone(),
    ))
}

pub fn proposer_slashing_signature_sets<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    proposer_slashing: &ProposerSlashing,
) -> anyhow::Result<[SignatureSet; 2]> {
    Ok([
        block_header_signature_set(state, &proposer_slashing.signed_header_1)?,
        block_header_signature_set(state, &proposer_slashing.signed_header_2)?,
    ])
}

pub fn voluntary_exit_signature_set<P: Preset, S: BeaconStateView<P>>(
    state: &S,
    signed_exit: &SignedVoluntaryExit,
) -> anyhow::Result<SignatureSet> {
    let exit = &signed_exit.message;
    let domain = state.get_domain(DOMAIN_VOLUNTARY_EXIT, Some(exit.epoch));
    Ok(SignatureSet::single(
        validator_pubkey(state, exit.validator_index)?,
        compute_signing_root(exit, domain),
        signed_exit.signature.clone(),
    ))
}

/// The participants' signature over the previous slot's block root, or `None` when nobody
/// participated.
pub fn sync_aggregate_signature_set<P: Preset, S: PostAltairBeaconState<P>>(
    state: &S,
    sync_aggregate: &SyncAggregate<P>,
    block_root: B256,
) -> anyhow::Result<Option<SignatureSet>> {
    let participant_pubkeys = state
        .current_sync_committee()
        .pubkeys
        .iter()
        .zip(sync_aggregate.sync_committee_bits.iter())
        .filter_map(|(pubkey, bit)| bit.then(|| pubkey.clone()))
        .collect::<Vec<_>>();
    if participant_pubkeys.is_empty() {
        return Ok(None);
    }

    let previous_slot = state.slot().max(1) - 1;
    let domain = state.get_domain(
        DOMAIN_SYNC_COMMITTEE,
        Some(compute_epoch_at_slot::<P>(previous_slot)),
    );
    Ok(Some(SignatureSet::multiple(
        participant_pubkeys,
        compute_signing_root(block_root, domain),
        sync_aggregate.sync_committee_signature.clone(),
    )))
}

/// Deposits are signed over the genesis fork version with an empty validators root so they
/// stay valid across forks.
pub fn deposit_signature_set(deposit_data: &DepositData, spec: &NetworkSpec) -> SignatureSet {
    let domain = compute_domain(DOMAIN_DEPOSIT, spec.genesis_fork_version, B256::ZERO);
    SignatureSet::single(
        deposit_data.pubkey.clone(),
        compute_signing_root(deposit_data.to_deposit_message(), domain),
        deposit_data.signature.clone(),
    )
}
