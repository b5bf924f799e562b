use alloy_primitives::B256;
use anyhow::{anyhow, bail};
use ember_bls::BLSSignature;
use ember_consensus::{
    beacon_block_header::BeaconBlockHeader,
    checkpoint::Checkpoint,
    constants::{EFFECTIVE_BALANCE_INCREMENT, GENESIS_EPOCH, GENESIS_SLOT, MAX_EFFECTIVE_BALANCE},
    deposit::Deposit,
    eth_1_data::Eth1Data,
    fork::Fork,
    phase0::{beacon_block::BeaconBlockBody, beacon_state::BeaconState},
    preset::Preset,
    view::BeaconStateView,
};
use ember_merkle::DepositTree;
use ember_network_spec::NetworkSpec;
use ember_persistent::{PersistentList, PersistentVector};
use ssz_types::{BitVector, VariableList};
use tracing::info;
use tree_hash::TreeHash;

use crate::block_processing::process_deposit;

fn empty_block_body_root<P: Preset>() -> B256 {
    BeaconBlockBody::<P> {
        randao_reveal: BLSSignature::default(),
        eth1_data: Eth1Data::default(),
        graffiti: B256::ZERO,
        proposer_slashings: VariableList::empty(),
        attester_slashings: VariableList::empty(),
        attestations: VariableList::empty(),
        deposits: VariableList::empty(),
        voluntary_exits: VariableList::empty(),
    }
    .tree_hash_root()
}

/// Builds the phase0 genesis state from the deposits seen on the eth1 chain up to
/// `eth1_block_hash`.
///
/// Each deposit is checked against the deposit root of the deposits before it, so deposit
/// `i` must carry a proof against a tree of `i + 1` leaves. Validators whose balance reaches
/// `MAX_EFFECTIVE_BALANCE` are active from the genesis epoch.
pub fn initialize_beacon_state_from_eth1<P: Preset>(
    eth1_block_hash: B256,
    eth1_timestamp: u64,
    deposits: &[Deposit],
    spec: &NetworkSpec,
) -> anyhow::Result<BeaconState<P>> {
    let fork = Fork {
        previous_version: spec.genesis_fork_version,
        current_version: spec.genesis_fork_version,
        epoch: GENESIS_EPOCH,
    };
    let mut state = BeaconState::<P> {
        genesis_time: eth1_timestamp + spec.genesis_delay,
        genesis_validators_root: B256::ZERO,
        slot: GENESIS_SLOT,
        fork,
        latest_block_header: BeaconBlockHeader {
            slot: GENESIS_SLOT,
            proposer_index: 0,
            parent_root: B256::ZERO,
            state_root: B256::ZERO,
            body_root: empty_block_body_root::<P>(),
        },
        block_roots: PersistentVector::default(),
        state_roots: PersistentVector::default(),
        historical_roots: PersistentList::default(),
        eth1_data: Eth1Data {
            deposit_root: B256::ZERO,
            deposit_count: deposits.len() as u64,
            block_hash: eth1_block_hash,
        },
        eth1_data_votes: PersistentList::default(),
        eth1_deposit_index: 0,
        validators: PersistentList::default(),
        balances: PersistentList::default(),
        // Seed RANDAO with Eth1 entropy
        randao_mixes: PersistentVector::repeat(eth1_block_hash),
        slashings: PersistentVector::default(),
        previous_epoch_attestations: PersistentList::default(),
        current_epoch_attestations: PersistentList::default(),
        justification_bits: BitVector::new(),
        previous_justified_checkpoint: Checkpoint::default(),
        current_justified_checkpoint: Checkpoint::default(),
        finalized_checkpoint: Checkpoint::default(),
    };

    // Process deposits
    let mut deposit_tree = DepositTree::new();
    for deposit in deposits {
        deposit_tree.push_leaf(deposit.data.tree_hash_root())?;
        state.eth1_data.deposit_root = deposit_tree.root();
        process_deposit(&mut state, deposit, spec)?;
    }

    // Process activations
    for index in 0..state.validators.len() {
        let balance = *state
            .balances
            .get(index)
            .ok_or_else(|| anyhow!("No balance for validator {index}"))?;
        let Some(validator) = state.validators.get_mut(index) else {
            bail!("Validator {index} not found");
        };
        validator.effective_balance =
            (balance - balance % EFFECTIVE_BALANCE_INCREMENT).min(MAX_EFFECTIVE_BALANCE);
        if validator.effective_balance == MAX_EFFECTIVE_BALANCE {
            validator.activation_eligibility_epoch = GENESIS_EPOCH;
            validator.activation_epoch = GENESIS_EPOCH;
        }
    }

    // Set genesis validators root for domain separation and chain versioning
    state.genesis_validators_root = state.validators.tree_hash_root();

    info!(
        genesis_time = state.genesis_time,
        validators = state.validators.len(),
        active = state.get_active_validator_indices(GENESIS_EPOCH).len(),
        "Initialized genesis state"
    );
    Ok(state)
}

pub fn is_valid_genesis_state<P: Preset>(state: &BeaconState<P>, spec: &NetworkSpec) -> bool {
    if state.genesis_time < spec.min_genesis_time {
        return false;
    }
    state.get_active_validator_indices(GENESIS_EPOCH).len() as u64
        >= spec.min_genesis_active_validator_count
}

#[cfg(test)]
mod tests {
    use ember_consensus::{constants::FAR_FUTURE_EPOCH, preset::Minimal};
    use ember_network_spec::MINIMAL;
    use tracing_test::traced_test;

    use super::*;
    use crate::test_utils::{build_deposits, deposit_data, genesis_deposits, phase0_state};

    const ETH1_BLOCK_HASH: B256 = B256::repeat_byte(0x42);

    #[test]
    fn genesis_activates_full_deposits() {
        let state = phase0_state(64);
        assert!(is_valid_genesis_state(&state, &MINIMAL));
        assert_eq!(state.genesis_time, MINIMAL.min_genesis_time + MINIMAL.genesis_delay);
        assert_eq!(state.eth1_deposit_index, 64);
        assert_eq!(state.eth1_data.deposit_count, 64);
        assert_eq!(state.get_active_validator_indices(GENESIS_EPOCH).len(), 64);
        assert_eq!(state.genesis_validators_root, state.validators.tree_hash_root());
        assert!(state.randao_mixes.iter().all(|mix| *mix == ETH1_BLOCK_HASH));
    }

    #[test]
    fn too_few_validators_is_not_a_valid_genesis() {
        let state = phase0_state(16);
        assert!(!is_valid_genesis_state(&state, &MINIMAL));

        let early = initialize_beacon_state_from_eth1::<Minimal>(
            ETH1_BLOCK_HASH,
            MINIMAL.min_genesis_time - MINIMAL.genesis_delay - 1,
            &genesis_deposits()[..64],
            &MINIMAL,
        )
        .expect("genesis state");
        assert!(!is_valid_genesis_state(&early, &MINIMAL));
    }

    #[test]
    fn partial_deposits_top_up_before_activation() {
        let half = MAX_EFFECTIVE_BALANCE / 2;
        let deposits = build_deposits(vec![
            deposit_data(0, half),
            deposit_data(1, half),
            deposit_data(0, half),
        ]);
        let state = initialize_beacon_state_from_eth1::<Minimal>(
            ETH1_BLOCK_HASH,
            MINIMAL.min_genesis_time,
            &deposits,
            &MINIMAL,
        )
        .expect("genesis state");

        assert_eq!(state.validators.len(), 2);
        assert_eq!(state.balances.get(0), Some(&MAX_EFFECTIVE_BALANCE));
        let topped_up = state.validators.get(0).expect("validator");
        assert_eq!(topped_up.activation_epoch, GENESIS_EPOCH);
        let partial = state.validators.get(1).expect("validator");
        assert_eq!(partial.effective_balance, half);
        assert_eq!(partial.activation_epoch, FAR_FUTURE_EPOCH);
    }

    #[test]
    #[traced_test]
    fn deposit_with_bad_signature_is_skipped() {
        let mut forged = deposit_data(1, MAX_EFFECTIVE_BALANCE);
        forged.signature = deposit_data(2, MAX_EFFECTIVE_BALANCE).signature;
        let deposits = build_deposits(vec![deposit_data(0, MAX_EFFECTIVE_BALANCE), forged]);
        let state = initialize_beacon_state_from_eth1::<Minimal>(
            ETH1_BLOCK_HASH,
            MINIMAL.min_genesis_time,
            &deposits,
            &MINIMAL,
        )
        .expect("a bad deposit signature is not fatal");

        assert_eq!(state.validators.len(), 1);
        assert_eq!(state.eth1_deposit_index, 2);
        assert!(logs_contain("Skipping deposit with invalid signature"));
    }

    #[test]
    fn deposit_with_bad_proof_is_fatal() {
        let mut deposits = build_deposits(vec![deposit_data(0, MAX_EFFECTIVE_BALANCE)]);
        deposits[0].proof[0] = B256::repeat_byte(0xff);
        assert!(
            initialize_beacon_state_from_eth1::<Minimal>(
                ETH1_BLOCK_HASH,
                MINIMAL.min_genesis_time,
                &deposits,
                &MINIMAL,
            )
            .is_err()
        );
    }
}
