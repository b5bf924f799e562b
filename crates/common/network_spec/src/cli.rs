use std::{fs, sync::Arc};

use crate::networks::{MAINNET, MINIMAL, NetworkSpec};

/// Resolves `--network`: a built-in name or the path of a `config.yaml`.
pub fn network_parser(network_string: &str) -> Result<Arc<NetworkSpec>, String> {
    match network_string {
        "mainnet" => Ok(MAINNET.clone()),
        "minimal" => Ok(MINIMAL.clone()),
        path => read_network_spec(path),
    }
}

fn read_network_spec(path: &str) -> Result<Arc<NetworkSpec>, String> {
    let contents = fs::read_to_string(path).map_err(|err| format!("Failed to read file: {err}"))?;
    Ok(Arc::new(NetworkSpec::from_yaml_str(&contents).map_err(
        |err| format!("Failed to parse YAML from: {err}"),
    )?))
}
