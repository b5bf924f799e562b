use std::{
    collections::HashMap,
    sync::{LazyLock, Mutex},
};

use alloy_primitives::B256;
use ember_bls::{
    BLSSignature, PrivateKey,
    traits::{Aggregatable, Signable},
};
use ember_consensus::{
    altair,
    attestation::Attestation,
    attestation_data::AttestationData,
    attester_slashing::AttesterSlashing,
    beacon_block::SignedBeaconBlock,
    beacon_state::BeaconState,
    bellatrix,
    checkpoint::Checkpoint,
    constants::{
        DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER, DOMAIN_DEPOSIT, DOMAIN_RANDAO,
        DOMAIN_SYNC_COMMITTEE, MAX_EFFECTIVE_BALANCE,
    },
    deposit::Deposit,
    deposit_data::DepositData,
    deposit_message::DepositMessage,
    execution_payload::ExecutionPayload,
    indexed_attestation::IndexedAttestation,
    misc::{compute_domain, compute_epoch_at_slot, compute_signing_root, compute_start_slot_at_epoch},
    phase0,
    preset::Minimal,
    proposer_slashing::ProposerSlashing,
    sync_committee::SyncAggregate,
    view::{BeaconStateView, PostAltairBeaconState},
    voluntary_exit::SignedVoluntaryExit,
};
use ember_execution_engine::MockExecutionEngine;
use ember_merkle::DepositTree;
use ember_network_spec::{ForkName, MINIMAL, NetworkSpec};
use ssz_types::{BitList, BitVector, FixedVector, VariableList};
use tree_hash::TreeHash;

use crate::{
    block_processing, genesis::initialize_beacon_state_from_eth1, process_slots,
    signature_collector::SignatureCollector,
    upgrades::{upgrade_to_altair, upgrade_to_bellatrix},
};

const KEY_COUNT: usize = 128;

static PRIVATE_KEYS: LazyLock<Vec<PrivateKey>> = LazyLock::new(|| {
    (0..KEY_COUNT)
        .map(|index| {
            let mut ikm = [0u8; 32];
            ikm[..8].copy_from_slice(&(index as u64 + 1).to_le_bytes());
            PrivateKey::key_gen(&ikm).expect("valid key material")
        })
        .collect()
});

static GENESIS_DEPOSITS: LazyLock<Vec<Deposit>> = LazyLock::new(|| {
    build_deposits(
        (0..KEY_COUNT)
            .map(|index| deposit_data(index, MAX_EFFECTIVE_BALANCE))
            .collect(),
    )
});

static PHASE0_STATES: LazyLock<Mutex<HashMap<usize, phase0::beacon_state::BeaconState<Minimal>>>> =
    LazyLock::new(Default::default);

pub fn private_key(index: u64) -> &'static PrivateKey {
    &PRIVATE_KEYS[index as usize]
}

pub fn deposit_data(index: usize, amount: u64) -> DepositData {
    let key = private_key(index as u64);
    let pubkey = key.public_key().expect("public key");
    let mut withdrawal_credentials = B256::from_slice(&ethereum_hashing::hash(pubkey.to_bytes()));
    withdrawal_credentials.0[0] = 0;
    let message = DepositMessage {
        pubkey: pubkey.clone(),
        withdrawal_credentials,
        amount,
    };
    let domain = compute_domain(DOMAIN_DEPOSIT, MINIMAL.genesis_fork_version, B256::ZERO);
    let signature = key
        .sign(compute_signing_root(&message, domain).as_slice())
        .expect("signs");
    DepositData {
        pubkey,
        withdrawal_credentials,
        amount,
        signature,
    }
}

/// Attaches proofs so that deposit `i` verifies against the tree of the first `i + 1` leaves.
pub fn build_deposits(data: Vec<DepositData>) -> Vec<Deposit> {
    let mut tree = DepositTree::new();
    data.into_iter()
        .map(|data| {
            tree.push_leaf(data.tree_hash_root()).expect("tree has room");
            let proof = tree.proof(tree.len() - 1).expect("proof");
            Deposit {
                proof: FixedVector::new(proof).expect("33 branch nodes"),
                data,
            }
        })
        .collect()
}

pub fn genesis_deposits() -> &'static [Deposit] {
    &GENESIS_DEPOSITS
}

/// Genesis state with `validator_count` fully funded validators.
pub fn phase0_state(validator_count: usize) -> phase0::beacon_state::BeaconState<Minimal> {
    let mut states = PHASE0_STATES
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    states
        .entry(validator_count)
        .or_insert_with(|| {
            initialize_beacon_state_from_eth1::<Minimal>(
                B256::repeat_byte(0x42),
                MINIMAL.min_genesis_time,
                &genesis_deposits()[..validator_count],
                &MINIMAL,
            )
            .expect("genesis state")
        })
        .clone()
}

pub fn altair_state(validator_count: usize) -> altair::beacon_state::BeaconState<Minimal> {
    upgrade_to_altair(phase0_state(validator_count), &spec_for(ForkName::Altair))
        .expect("altair upgrade")
}

pub fn bellatrix_state(validator_count: usize) -> bellatrix::beacon_state::BeaconState<Minimal> {
    upgrade_to_bellatrix(
        altair_state(validator_count),
        &spec_for(ForkName::Bellatrix),
    )
    .expect("bellatrix upgrade")
}

/// Minimal network with every fork up to `fork` active from genesis.
pub fn spec_for(fork: ForkName) -> NetworkSpec {
    MINIMAL.with_genesis_fork(fork)
}

pub fn advance(
    mut state: BeaconState<Minimal>,
    slot: u64,
    spec: &NetworkSpec,
) -> BeaconState<Minimal> {
    if state.slot() < slot {
        process_slots(&mut state, slot, spec).expect("slots advance");
    }
    state
}

fn sign_with(index: u64, signing_root: B256) -> BLSSignature {
    private_key(index)
        .sign(signing_root.as_slice())
        .expect("signs")
}

fn aggregate(signatures: &[BLSSignature]) -> BLSSignature {
    let signatures = signatures.iter().collect::<Vec<_>>();
    BLSSignature::aggregate(&signatures).expect("aggregates")
}

/// Indexed attestation over `data` carrying the aggregate signature of every validator in
/// `indices`.
pub fn indexed_attestation<S: BeaconStateView<Minimal>>(
    state: &S,
    indices: Vec<u64>,
    data: AttestationData,
) -> IndexedAttestation<Minimal> {
    let domain = state.get_domain(DOMAIN_BEACON_ATTESTER, Some(data.target.epoch));
    let signing_root = compute_signing_root(&data, domain);
    let signatures = indices
        .iter()
        .map(|&index| sign_with(index, signing_root))
        .collect::<Vec<_>>();
    IndexedAttestation {
        attesting_indices: VariableList::new(indices).expect("within committee limit"),
        signature: aggregate(&signatures),
        data,
    }
}

/// One fully participating attestation per committee of `slot`. The state must be past `slot`.
pub fn full_attestations<S: BeaconStateView<Minimal>>(
    state: &S,
    slot: u64,
) -> Vec<Attestation<Minimal>> {
    let epoch = compute_epoch_at_slot::<Minimal>(slot);
    let source = if epoch == state.get_current_epoch() {
        state.current_justified_checkpoint()
    } else {
        state.previous_justified_checkpoint()
    };
    let target_root = state
        .get_block_root_at_slot(compute_start_slot_at_epoch::<Minimal>(epoch))
        .expect("target root");
    let beacon_block_root = state.get_block_root_at_slot(slot).expect("head root");
    let domain = state.get_domain(DOMAIN_BEACON_ATTESTER, Some(epoch));

    (0..state.get_committee_count_per_slot(epoch))
        .map(|index| {
            let data = AttestationData {
                slot,
                index,
                beacon_block_root,
                source,
                target: Checkpoint {
                    epoch,
                    root: target_root,
                },
            };
            let committee = state.get_beacon_committee(slot, index).expect("committee");
            let mut aggregation_bits =
                BitList::with_capacity(committee.len()).expect("committee fits");
            for position in 0..committee.len() {
                aggregation_bits.set(position, true).expect("in range");
            }
            let signing_root = compute_signing_root(&data, domain);
            let signatures = committee
                .iter()
                .map(|&member| sign_with(member, signing_root))
                .collect::<Vec<_>>();
            Attestation {
                aggregation_bits,
                data,
                signature: aggregate(&signatures),
            }
        })
        .collect()
}

/// Sync aggregate with every committee member signing the previous slot's block root.
pub fn full_sync_aggregate<S: PostAltairBeaconState<Minimal>>(state: &S) -> SyncAggregate<Minimal> {
    let previous_slot = state.slot().max(1) - 1;
    let block_root = state
        .get_block_root_at_slot(previous_slot)
        .expect("previous block root");
    let domain = state.get_domain(
        DOMAIN_SYNC_COMMITTEE,
        Some(compute_epoch_at_slot::<Minimal>(previous_slot)),
    );
    let signing_root = compute_signing_root(block_root, domain);
    let indices = state
        .validators()
        .iter()
        .enumerate()
        .map(|(index, validator)| (validator.pubkey.clone(), index as u64))
        .collect::<HashMap<_, _>>();

    let committee = state.current_sync_committee();
    let mut sync_committee_bits = BitVector::new();
    let mut signatures = Vec::with_capacity(committee.pubkeys.len());
    for (position, pubkey) in committee.pubkeys.iter().enumerate() {
        sync_committee_bits.set(position, true).expect("in range");
        signatures.push(sign_with(indices[pubkey], signing_root));
    }
    SyncAggregate {
        sync_committee_bits,
        sync_committee_signature: aggregate(&signatures),
    }
}

#[derive(Default)]
pub struct BlockOperations {
    pub proposer_slashings: Vec<ProposerSlashing>,
    pub attester_slashings: Vec<AttesterSlashing<Minimal>>,
    pub attestations: Vec<Attestation<Minimal>>,
    pub deposits: Vec<Deposit>,
    pub voluntary_exits: Vec<SignedVoluntaryExit>,
}

/// Produces a correctly signed block for `slot` on top of `pre`, with its state root filled in.
pub fn build_block(
    pre: &BeaconState<Minimal>,
    slot: u64,
    spec: &NetworkSpec,
    operations: BlockOperations,
) -> SignedBeaconBlock<Minimal> {
    let mut state = advance(pre.clone(), slot, spec);
    let proposer_index = state.get_beacon_proposer_index().expect("proposer");
    let parent_root = state.latest_block_header().tree_hash_root();
    let epoch = compute_epoch_at_slot::<Minimal>(slot);
    let randao_reveal = sign_with(
        proposer_index,
        compute_signing_root(epoch, state.get_domain(DOMAIN_RANDAO, Some(epoch))),
    );
    let eth1_data = state.eth1_data().clone();
    let BlockOperations {
        proposer_slashings,
        attester_slashings,
        attestations,
        deposits,
        voluntary_exits,
    } = operations;
    let proposer_slashings = VariableList::new(proposer_slashings).expect("fits");
    let attester_slashings = VariableList::new(attester_slashings).expect("fits");
    let attestations = VariableList::new(attestations).expect("fits");
    let deposits = VariableList::new(deposits).expect("fits");
    let voluntary_exits = VariableList::new(voluntary_exits).expect("fits");

    let mut block: SignedBeaconBlock<Minimal> = match &state {
        BeaconState::Phase0(_) => phase0::beacon_block::SignedBeaconBlock {
            message: phase0::beacon_block::BeaconBlock {
                slot,
                proposer_index,
                parent_root,
                state_root: B256::ZERO,
                body: phase0::beacon_block::BeaconBlockBody {
                    randao_reveal,
                    eth1_data,
                    graffiti: B256::ZERO,
                    proposer_slashings,
                    attester_slashings,
                    attestations,
                    deposits,
                    voluntary_exits,
                },
            },
            signature: BLSSignature::default(),
        }
        .into(),
        BeaconState::Altair(inner) => altair::beacon_block::SignedBeaconBlock {
            message: altair::beacon_block::BeaconBlock {
                slot,
                proposer_index,
                parent_root,
                state_root: B256::ZERO,
                body: altair::beacon_block::BeaconBlockBody {
                    randao_reveal,
                    eth1_data,
                    graffiti: B256::ZERO,
                    proposer_slashings,
                    attester_slashings,
                    attestations,
                    deposits,
                    voluntary_exits,
                    sync_aggregate: full_sync_aggregate(inner),
                },
            },
            signature: BLSSignature::default(),
        }
        .into(),
        BeaconState::Bellatrix(inner) => bellatrix::beacon_block::SignedBeaconBlock {
            message: bellatrix::beacon_block::BeaconBlock {
                slot,
                proposer_index,
                parent_root,
                state_root: B256::ZERO,
                body: bellatrix::beacon_block::BeaconBlockBody {
                    randao_reveal,
                    eth1_data,
                    graffiti: B256::ZERO,
                    proposer_slashings,
                    attester_slashings,
                    attestations,
                    deposits,
                    voluntary_exits,
                    sync_aggregate: full_sync_aggregate(inner),
                    execution_payload: ExecutionPayload::default(),
                },
            },
            signature: BLSSignature::default(),
        }
        .into(),
    };

    block_processing::process_block(
        &mut state,
        &block,
        &mut SignatureCollector::disabled(),
        &MockExecutionEngine::new(),
        spec,
    )
    .expect("block applies");
    let state_root = state.tree_hash_root();
    match &mut block {
        SignedBeaconBlock::Phase0(block) => block.message.state_root = state_root,
        SignedBeaconBlock::Altair(block) => block.message.state_root = state_root,
        SignedBeaconBlock::Bellatrix(block) => block.message.state_root = state_root,
    }

    let domain = state.get_domain(DOMAIN_BEACON_PROPOSER, Some(epoch));
    let signature = sign_with(proposer_index, compute_signing_root(block.message_root(), domain));
    match &mut block {
        SignedBeaconBlock::Phase0(block) => block.signature = signature,
        SignedBeaconBlock::Altair(block) => block.signature = signature,
        SignedBeaconBlock::Bellatrix(block) => block.signature = signature,
    }
    block
}
