use std::{path::PathBuf, sync::Arc};

use clap::{Parser, ValueEnum};
use ember_network_spec::{cli::network_parser, networks::NetworkSpec};

use crate::cli::verbosity::{Verbosity, verbosity_parser};

const DEFAULT_NETWORK: &str = "mainnet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresetName {
    Mainnet,
    Minimal,
}

#[derive(Debug, Parser)]
pub struct TransitionConfig {
    /// Verbosity level
    #[arg(short, long, default_value = "3", value_parser = verbosity_parser)]
    pub verbosity: Verbosity,

    #[arg(
        long,
        help = "Choose mainnet, minimal, or the path of a config.yaml",
        default_value = DEFAULT_NETWORK,
        value_parser = network_parser
    )]
    pub network: Arc<NetworkSpec>,

    #[arg(long, help = "Preset the states and blocks are encoded with. Defaults to the network's")]
    pub preset: Option<PresetName>,

    #[arg(long, help = "SSZ encoded pre-state, snappy compressed if it ends in .ssz_snappy")]
    pub pre_state: PathBuf,

    #[arg(
        long = "block",
        help = "SSZ encoded signed block. Repeat to apply several blocks in order"
    )]
    pub blocks: Vec<PathBuf>,

    #[arg(long, help = "Where to write the SSZ encoded post-state")]
    pub post_state: PathBuf,

    #[arg(long, help = "Execution engine verdicts as YAML. Every payload is valid if unset")]
    pub execution: Option<PathBuf>,

    #[arg(long, help = "Skip BLS signature verification")]
    pub no_verify_signatures: bool,

    #[arg(long, help = "Skip the block state root check")]
    pub no_verify_state_root: bool,
}

impl TransitionConfig {
    pub fn preset(&self) -> PresetName {
        self.preset.unwrap_or(match self.network.preset_base.as_str() {
            "minimal" => PresetName::Minimal,
            _ => PresetName::Mainnet,
        })
    }
}
