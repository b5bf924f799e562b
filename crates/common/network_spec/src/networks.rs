use std::sync::{Arc, LazyLock};

use alloy_primitives::{Address, B256, U256, address, aliases::B32, fixed_bytes};
use serde::{Deserialize, Serialize};

use crate::fork_schedule::{FAR_FUTURE_EPOCH, ForkName, ForkSchedule, ScheduledFork};

/// Runtime chain configuration, in the upper-case YAML layout of the consensus `config.yaml`.
///
/// Keys for forks beyond bellatrix are ignored when loading.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct NetworkSpec {
    pub preset_base: String,
    pub config_name: String,

    // Transition
    #[serde(with = "serde_utils::quoted_u256")]
    pub terminal_total_difficulty: U256,
    #[serde(with = "crate::fixed_hex")]
    pub terminal_block_hash: B256,
    pub terminal_block_hash_activation_epoch: u64,

    // Genesis
    pub min_genesis_active_validator_count: u64,
    pub min_genesis_time: u64,
    #[serde(with = "crate::fixed_hex")]
    pub genesis_fork_version: B32,
    pub genesis_delay: u64,

    // Forking
    #[serde(with = "crate::fixed_hex")]
    pub altair_fork_version: B32,
    pub altair_fork_epoch: u64,
    #[serde(with = "crate::fixed_hex")]
    pub bellatrix_fork_version: B32,
    pub bellatrix_fork_epoch: u64,

    // Time parameters
    pub seconds_per_slot: u64,
    pub seconds_per_eth1_block: u64,
    pub min_validator_withdrawability_delay: u64,
    pub shard_committee_period: u64,
    pub eth1_follow_distance: u64,

    // Validator cycle
    pub inactivity_score_bias: u64,
    pub inactivity_score_recovery_rate: u64,
    pub ejection_balance: u64,
    pub min_per_epoch_churn_limit: u64,
    pub churn_limit_quotient: u64,

    // Deposit contract
    pub deposit_chain_id: u64,
    pub deposit_network_id: u64,
    pub deposit_contract_address: Address,
}

impl NetworkSpec {
    pub fn fork_schedule(&self) -> ForkSchedule {
        ForkSchedule([
            ScheduledFork {
                name: ForkName::Phase0,
                previous_version: self.genesis_fork_version,
                current_version: self.genesis_fork_version,
                epoch: 0,
            },
            ScheduledFork {
                name: ForkName::Altair,
                previous_version: self.genesis_fork_version,
                current_version: self.altair_fork_version,
                epoch: self.altair_fork_epoch,
            },
            ScheduledFork {
                name: ForkName::Bellatrix,
                previous_version: self.altair_fork_version,
                current_version: self.bellatrix_fork_version,
                epoch: self.bellatrix_fork_epoch,
            },
        ])
    }

    pub fn fork_at_epoch(&self, epoch: u64) -> ForkName {
        self.fork_schedule().at_epoch(epoch).name
    }

    pub fn fork_epoch(&self, fork: ForkName) -> u64 {
        match fork {
            ForkName::Phase0 => 0,
            ForkName::Altair => self.altair_fork_epoch,
            ForkName::Bellatrix => self.bellatrix_fork_epoch,
        }
    }

    pub fn fork_version(&self, fork: ForkName) -> B32 {
        match fork {
            ForkName::Phase0 => self.genesis_fork_version,
            ForkName::Altair => self.altair_fork_version,
            ForkName::Bellatrix => self.bellatrix_fork_version,
        }
    }

    /// A copy with every fork up to and including `fork` active from genesis and later forks
    /// unscheduled.
    pub fn with_genesis_fork(&self, fork: ForkName) -> Self {
        let epoch_for = |candidate: ForkName| {
            if candidate <= fork {
                0
            } else {
                FAR_FUTURE_EPOCH
            }
        };
        Self {
            altair_fork_epoch: epoch_for(ForkName::Altair),
            bellatrix_fork_epoch: epoch_for(ForkName::Bellatrix),
            ..self.clone()
        }
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }
}

pub static MAINNET: LazyLock<Arc<NetworkSpec>> = LazyLock::new(|| {
    NetworkSpec {
        preset_base: "mainnet".to_string(),
        config_name: "mainnet".to_string(),
        terminal_total_difficulty: U256::from(58_750_000_000_000_000_000_000u128),
        terminal_block_hash: B256::ZERO,
        terminal_block_hash_activation_epoch: FAR_FUTURE_EPOCH,
        min_genesis_active_validator_count: 16384,
        min_genesis_time: 1606824000,
        genesis_fork_version: fixed_bytes!("0x00000000"),
        genesis_delay: 604800,
        altair_fork_version: fixed_bytes!("0x01000000"),
        altair_fork_epoch: 74240,
        bellatrix_fork_version: fixed_bytes!("0x02000000"),
        bellatrix_fork_epoch: 144896,
        seconds_per_slot: 12,
        seconds_per_eth1_block: 14,
        min_validator_withdrawability_delay: 256,
        shard_committee_period: 256,
        eth1_follow_distance: 2048,
        inactivity_score_bias: 4,
        inactivity_score_recovery_rate: 16,
        ejection_balance: 16_000_000_000,
        min_per_epoch_churn_limit: 4,
        churn_limit_quotient: 65536,
        deposit_chain_id: 1,
        deposit_network_id: 1,
        deposit_contract_address: address!("0x00000000219ab540356cBB839Cbe05303d7705Fa"),
    }
    .into()
});

pub static MINIMAL: LazyLock<Arc<NetworkSpec>> = LazyLock::new(|| {
    NetworkSpec {
        preset_base: "minimal".to_string(),
        config_name: "minimal".to_string(),
        terminal_total_difficulty: U256::MAX - U256::from(1023),
        terminal_block_hash: B256::ZERO,
        terminal_block_hash_activation_epoch: FAR_FUTURE_EPOCH,
        min_genesis_active_validator_count: 64,
        min_genesis_time: 1578009600,
        genesis_fork_version: fixed_bytes!("0x00000001"),
        genesis_delay: 300,
        altair_fork_version: fixed_bytes!("0x01000001"),
        altair_fork_epoch: FAR_FUTURE_EPOCH,
        bellatrix_fork_version: fixed_bytes!("0x02000001"),
        bellatrix_fork_epoch: FAR_FUTURE_EPOCH,
        seconds_per_slot: 6,
        seconds_per_eth1_block: 14,
        min_validator_withdrawability_delay: 256,
        shard_committee_period: 64,
        eth1_follow_distance: 16,
        inactivity_score_bias: 4,
        inactivity_score_recovery_rate: 16,
        ejection_balance: 16_000_000_000,
        min_per_epoch_churn_limit: 2,
        churn_limit_quotient: 32,
        deposit_chain_id: 5,
        deposit_network_id: 5,
        deposit_contract_address: address!("0x1234567890123456789012345678901234567890"),
    }
    .into()
});

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
PRESET_BASE: 'minimal'
CONFIG_NAME: 'testnet'
TERMINAL_TOTAL_DIFFICULTY: '0'
TERMINAL_BLOCK_HASH: 0x0000000000000000000000000000000000000000000000000000000000000000
TERMINAL_BLOCK_HASH_ACTIVATION_EPOCH: 18446744073709551615
MIN_GENESIS_ACTIVE_VALIDATOR_COUNT: 64
MIN_GENESIS_TIME: 1578009600
GENESIS_FORK_VERSION: 0x00000001
GENESIS_DELAY: 300
ALTAIR_FORK_VERSION: 0x01000001
ALTAIR_FORK_EPOCH: 2
BELLATRIX_FORK_VERSION: 0x02000001
BELLATRIX_FORK_EPOCH: 4
CAPELLA_FORK_VERSION: 0x03000001
CAPELLA_FORK_EPOCH: 18446744073709551615
SECONDS_PER_SLOT: 6
SECONDS_PER_ETH1_BLOCK: 14
MIN_VALIDATOR_WITHDRAWABILITY_DELAY: 256
SHARD_COMMITTEE_PERIOD: 64
ETH1_FOLLOW_DISTANCE: 16
INACTIVITY_SCORE_BIAS: 4
INACTIVITY_SCORE_RECOVERY_RATE: 16
EJECTION_BALANCE: 16000000000
MIN_PER_EPOCH_CHURN_LIMIT: 2
CHURN_LIMIT_QUOTIENT: 32
DEPOSIT_CHAIN_ID: 5
DEPOSIT_NETWORK_ID: 5
DEPOSIT_CONTRACT_ADDRESS: 0x1234567890123456789012345678901234567890
"#;

    #[test]
    fn parses_upper_case_yaml() {
        let spec = NetworkSpec::from_yaml_str(CONFIG).expect("valid config");
        assert_eq!(spec.config_name, "testnet");
        assert_eq!(spec.altair_fork_version, fixed_bytes!("0x01000001"));
        assert_eq!(spec.churn_limit_quotient, 32);
        assert_eq!(
            spec.deposit_contract_address,
            address!("0x1234567890123456789012345678901234567890")
        );
    }

    #[test]
    fn fork_lookup_follows_schedule() {
        let spec = NetworkSpec::from_yaml_str(CONFIG).expect("valid config");
        assert_eq!(spec.fork_at_epoch(0), ForkName::Phase0);
        assert_eq!(spec.fork_at_epoch(2), ForkName::Altair);
        assert_eq!(spec.fork_at_epoch(3), ForkName::Altair);
        assert_eq!(spec.fork_at_epoch(100), ForkName::Bellatrix);
        assert_eq!(spec.fork_schedule().scheduled().count(), 3);
    }

    #[test]
    fn genesis_fork_override() {
        let spec = MINIMAL.with_genesis_fork(ForkName::Altair);
        assert_eq!(spec.fork_at_epoch(0), ForkName::Altair);
        assert_eq!(spec.bellatrix_fork_epoch, FAR_FUTURE_EPOCH);
        assert_eq!(MINIMAL.fork_at_epoch(1_000_000), ForkName::Phase0);

        let spec = MAINNET.with_genesis_fork(ForkName::Bellatrix);
        assert_eq!(spec.fork_at_epoch(0), ForkName::Bellatrix);
    }
}
