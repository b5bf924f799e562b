use std::process;

use clap::Parser;
use ember::{
    cli::{Cli, Commands},
    transition::run_transition,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transition(config) => {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.verbosity.directive()));
            tracing_subscriber::fmt().with_env_filter(env_filter).init();

            if let Err(err) = run_transition(&config) {
                error!("State transition failed: {err:#}");
                process::exit(1);
            }
        }
    }
}
