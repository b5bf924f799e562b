use alloy_primitives::{aliases::B32, fixed_bytes};

pub const BASE_REWARDS_PER_EPOCH: u64 = 4;
pub const BASE_REWARD_FACTOR: u64 = 64;
pub const DEPOSIT_CONTRACT_TREE_DEPTH: u64 = 32;
pub const DOMAIN_AGGREGATE_AND_PROOF: B32 = fixed_bytes!("0x06000000");
pub const DOMAIN_BEACON_ATTESTER: B32 = fixed_bytes!("0x01000000");
pub const DOMAIN_BEACON_PROPOSER: B32 = fixed_bytes!("0x00000000");
pub const DOMAIN_DEPOSIT: B32 = fixed_bytes!("0x03000000");
pub const DOMAIN_RANDAO: B32 = fixed_bytes!("0x02000000");
pub const DOMAIN_SELECTION_PROOF: B32 = fixed_bytes!("0x05000000");
pub const DOMAIN_SYNC_COMMITTEE: B32 = fixed_bytes!("0x07000000");
pub const DOMAIN_VOLUNTARY_EXIT: B32 = fixed_bytes!("0x04000000");
pub const EFFECTIVE_BALANCE_INCREMENT: u64 = 1_000_000_000;
pub const FAR_FUTURE_EPOCH: u64 = u64::MAX;
pub const GENESIS_EPOCH: u64 = 0;
pub const GENESIS_SLOT: u64 = 0;
pub const HYSTERESIS_DOWNWARD_MULTIPLIER: u64 = 1;
pub const HYSTERESIS_QUOTIENT: u64 = 4;
pub const HYSTERESIS_UPWARD_MULTIPLIER: u64 = 5;
pub const JUSTIFICATION_BITS_LENGTH: usize = 4;
pub const MAX_EFFECTIVE_BALANCE: u64 = 32_000_000_000;
pub const MAX_RANDOM_BYTE: u64 = 255;
pub const MAX_SEED_LOOKAHEAD: u64 = 4;
pub const MIN_ATTESTATION_INCLUSION_DELAY: u64 = 1;
pub const MIN_DEPOSIT_AMOUNT: u64 = 1_000_000_000;
pub const MIN_EPOCHS_TO_INACTIVITY_PENALTY: u64 = 4;
pub const MIN_SEED_LOOKAHEAD: u64 = 1;
pub const PROPOSER_REWARD_QUOTIENT: u64 = 8;
pub const UINT64_MAX_SQRT: u64 = 4294967295;
pub const WHISTLEBLOWER_REWARD_QUOTIENT: u64 = 512;

// Withdrawal prefixes
pub const BLS_WITHDRAWAL_PREFIX: &[u8] = &[0];
pub const ETH1_ADDRESS_WITHDRAWAL_PREFIX: &[u8] = &[1];

// Participation flags
pub const TIMELY_HEAD_FLAG_INDEX: u8 = 2;
pub const TIMELY_SOURCE_FLAG_INDEX: u8 = 0;
pub const TIMELY_TARGET_FLAG_INDEX: u8 = 1;
pub const NUM_FLAG_INDICES: usize = 3;

// Incentivization weights
pub const PROPOSER_WEIGHT: u64 = 8;
pub const SYNC_REWARD_WEIGHT: u64 = 2;
pub const TIMELY_HEAD_WEIGHT: u64 = 14;
pub const TIMELY_SOURCE_WEIGHT: u64 = 14;
pub const TIMELY_TARGET_WEIGHT: u64 = 26;
pub const WEIGHT_DENOMINATOR: u64 = 64;

pub const PARTICIPATION_FLAG_WEIGHTS: [u64; NUM_FLAG_INDICES] = [
    TIMELY_SOURCE_WEIGHT,
    TIMELY_TARGET_WEIGHT,
    TIMELY_HEAD_WEIGHT,
];

// Altair penalties
pub const INACTIVITY_PENALTY_QUOTIENT_ALTAIR: u64 = 3 * (1 << 24);
pub const MIN_SLASHING_PENALTY_QUOTIENT_ALTAIR: u64 = 64;
pub const PROPORTIONAL_SLASHING_MULTIPLIER_ALTAIR: u64 = 2;

// Bellatrix penalties
pub const INACTIVITY_PENALTY_QUOTIENT_BELLATRIX: u64 = 1 << 24;
pub const MIN_SLASHING_PENALTY_QUOTIENT_BELLATRIX: u64 = 32;
pub const PROPORTIONAL_SLASHING_MULTIPLIER_BELLATRIX: u64 = 3;
