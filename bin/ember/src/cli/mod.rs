pub mod transition;
pub mod verbosity;

use clap::{Parser, Subcommand};

use crate::cli::transition::TransitionConfig;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply blocks to a pre-state and write the post-state
    #[command(name = "transition")]
    Transition(TransitionConfig),
}
