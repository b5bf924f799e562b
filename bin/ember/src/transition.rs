use alloy_primitives::B256;
use ember_consensus::{
    beacon_block::SignedBeaconBlock,
    beacon_state::BeaconState,
    preset::{Mainnet, Minimal, Preset},
    view::BeaconStateView,
};
use ember_execution_engine::MockExecutionEngine;
use ember_state_transition::{StateTransitionOptions, state_transition};
use ssz::Encode;
use tracing::info;
use tree_hash::TreeHash;

use crate::{
    cli::transition::{PresetName, TransitionConfig},
    ssz_file::{read_ssz, write_ssz},
};

/// Runs `ember transition` and returns the hash tree root of the post-state.
pub fn run_transition(config: &TransitionConfig) -> anyhow::Result<B256> {
    match config.preset() {
        PresetName::Mainnet => apply_blocks::<Mainnet>(config),
        PresetName::Minimal => apply_blocks::<Minimal>(config),
    }
}

fn apply_blocks<P: Preset>(config: &TransitionConfig) -> anyhow::Result<B256> {
    let spec = config.network.as_ref();
    let engine = match &config.execution {
        Some(path) => MockExecutionEngine::from_file(path)?,
        None => MockExecutionEngine::new(),
    };
    let options = StateTransitionOptions {
        verify_state_root: !config.no_verify_state_root,
        verify_proposer_signature: !config.no_verify_signatures,
        verify_signatures: !config.no_verify_signatures,
    };

    let mut state = BeaconState::<P>::from_ssz_bytes(&read_ssz(&config.pre_state)?, spec)?;
    info!(
        slot = state.slot(),
        fork = ?state.fork_name(),
        validators = state.validators().len(),
        "Loaded pre-state"
    );

    for path in &config.blocks {
        let block = SignedBeaconBlock::<P>::from_ssz_bytes(&read_ssz(path)?, spec)?;
        state = state_transition(&state, &block, options, &engine, spec)?;
        info!(slot = block.slot(), block_root = ?block.message_root(), "Applied block");
    }

    write_ssz(&config.post_state, &state.as_ssz_bytes())?;
    let state_root = state.tree_hash_root();
    info!(
        slot = state.slot(),
        ?state_root,
        path = %config.post_state.display(),
        "Wrote post-state"
    );
    Ok(state_root)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use ember_network_spec::MINIMAL;
    use ember_state_transition::genesis::initialize_beacon_state_from_eth1;

    use super::*;
    use crate::cli::{Cli, Commands};

    fn config(args: &[&str]) -> TransitionConfig {
        let Commands::Transition(config) =
            Cli::parse_from(["ember", "transition", "--network", "minimal"].iter().chain(args))
                .command;
        config
    }

    #[test]
    fn without_blocks_the_pre_state_is_written_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pre_path = dir.path().join("pre.ssz_snappy");
        let post_path = dir.path().join("post.ssz");
        let pre = BeaconState::from(
            initialize_beacon_state_from_eth1::<Minimal>(
                B256::repeat_byte(0x42),
                MINIMAL.min_genesis_time,
                &[],
                &MINIMAL,
            )
            .expect("genesis state"),
        );
        write_ssz(&pre_path, &pre.as_ssz_bytes()).expect("writes pre-state");

        let root = run_transition(&config(&[
            "--pre-state",
            pre_path.to_str().expect("utf-8 path"),
            "--post-state",
            post_path.to_str().expect("utf-8 path"),
        ]))
        .expect("transition runs");

        assert_eq!(root, pre.tree_hash_root());
        let post = BeaconState::<Minimal>::from_ssz_bytes(
            &read_ssz(&post_path).expect("reads post-state"),
            &MINIMAL,
        )
        .expect("decodes");
        assert_eq!(post.tree_hash_root(), root);
    }

    #[test]
    fn undecodable_block_fails_the_run() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pre_path = dir.path().join("pre.ssz");
        let block_path = dir.path().join("block.ssz");
        let pre = BeaconState::from(
            initialize_beacon_state_from_eth1::<Minimal>(
                B256::repeat_byte(0x42),
                MINIMAL.min_genesis_time,
                &[],
                &MINIMAL,
            )
            .expect("genesis state"),
        );
        write_ssz(&pre_path, &pre.as_ssz_bytes()).expect("writes pre-state");
        write_ssz(&block_path, &[0u8; 16]).expect("writes block");

        let result = run_transition(&config(&[
            "--pre-state",
            pre_path.to_str().expect("utf-8 path"),
            "--block",
            block_path.to_str().expect("utf-8 path"),
            "--post-state",
            dir.path().join("post.ssz").to_str().expect("utf-8 path"),
        ]));
        assert!(result.is_err());
        assert!(!dir.path().join("post.ssz").exists());
    }
}
