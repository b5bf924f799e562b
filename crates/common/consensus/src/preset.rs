use std::{fmt::Debug, hash::Hash};

use ssz_types::typenum::{
    U2, U16, U32, U64, U128, U256, U512, U1024, U2048, U4096, U8192, U65536,
    U1048576, U1073741824, U1099511627776, U16777216, Unsigned,
};

/// Bounds shared by every type-level length in a [`Preset`].
pub trait Length:
    Unsigned + Clone + Copy + Debug + Default + PartialEq + Eq + Hash + Send + Sync + 'static
{
}

impl<T> Length for T where
    T: Unsigned + Clone + Copy + Debug + Default + PartialEq + Eq + Hash + Send + Sync + 'static
{
}

/// Compile-time configuration variables.
///
/// SSZ lengths are `typenum` types so containers stay generic over the preset. Scalar values
/// are associated constants. Anything that may change between networks without changing the
/// SSZ layout lives in `NetworkSpec` instead.
pub trait Preset: Copy + Eq + Ord + Hash + Default + Debug + Send + Sync + 'static {
    // Phase 0
    type EpochsPerHistoricalVector: Length;
    type EpochsPerSlashingsVector: Length;
    type HistoricalRootsLimit: Length;
    type MaxAttestations: Length;
    type MaxAttesterSlashings: Length;
    type MaxDeposits: Length;
    type MaxPendingAttestations: Length;
    type MaxProposerSlashings: Length;
    type MaxValidatorsPerCommittee: Length;
    type MaxVoluntaryExits: Length;
    type SlotsPerEth1VotingPeriod: Length;
    type SlotsPerHistoricalRoot: Length;
    type ValidatorRegistryLimit: Length;

    // Altair
    type SyncCommitteeSize: Length;

    // Bellatrix
    type BytesPerLogsBloom: Length;
    type MaxBytesPerTransaction: Length;
    type MaxExtraDataBytes: Length;
    type MaxTransactionsPerPayload: Length;

    const NAME: &'static str;

    const EPOCHS_PER_ETH1_VOTING_PERIOD: u64;
    const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: u64;
    const INACTIVITY_PENALTY_QUOTIENT: u64;
    const MAX_COMMITTEES_PER_SLOT: u64;
    const MIN_SLASHING_PENALTY_QUOTIENT: u64;
    const PROPORTIONAL_SLASHING_MULTIPLIER: u64;
    const SHUFFLE_ROUND_COUNT: u8;
    const SLOTS_PER_EPOCH: u64;
    const TARGET_COMMITTEE_SIZE: u64;

    const EPOCHS_PER_HISTORICAL_VECTOR: u64 = Self::EpochsPerHistoricalVector::U64;
    const EPOCHS_PER_SLASHINGS_VECTOR: u64 = Self::EpochsPerSlashingsVector::U64;
    const MAX_DEPOSITS: u64 = Self::MaxDeposits::U64;
    const MAX_VALIDATORS_PER_COMMITTEE: u64 = Self::MaxValidatorsPerCommittee::U64;
    const SLOTS_PER_ETH1_VOTING_PERIOD: u64 = Self::SlotsPerEth1VotingPeriod::U64;
    const SLOTS_PER_HISTORICAL_ROOT: u64 = Self::SlotsPerHistoricalRoot::U64;
    const SYNC_COMMITTEE_SIZE: u64 = Self::SyncCommitteeSize::U64;
}

/// [Mainnet preset](https://github.com/ethereum/consensus-specs/tree/dev/presets/mainnet).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Mainnet;

impl Preset for Mainnet {
    type EpochsPerHistoricalVector = U65536;
    type EpochsPerSlashingsVector = U8192;
    type HistoricalRootsLimit = U16777216;
    type MaxAttestations = U128;
    type MaxAttesterSlashings = U2;
    type MaxDeposits = U16;
    type MaxPendingAttestations = U4096;
    type MaxProposerSlashings = U16;
    type MaxValidatorsPerCommittee = U2048;
    type MaxVoluntaryExits = U16;
    type SlotsPerEth1VotingPeriod = U2048;
    type SlotsPerHistoricalRoot = U8192;
    type ValidatorRegistryLimit = U1099511627776;

    type SyncCommitteeSize = U512;

    type BytesPerLogsBloom = U256;
    type MaxBytesPerTransaction = U1073741824;
    type MaxExtraDataBytes = U32;
    type MaxTransactionsPerPayload = U1048576;

    const NAME: &'static str = "mainnet";

    const EPOCHS_PER_ETH1_VOTING_PERIOD: u64 = 64;
    const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: u64 = 256;
    const INACTIVITY_PENALTY_QUOTIENT: u64 = 1 << 26;
    const MAX_COMMITTEES_PER_SLOT: u64 = 64;
    const MIN_SLASHING_PENALTY_QUOTIENT: u64 = 128;
    const PROPORTIONAL_SLASHING_MULTIPLIER: u64 = 1;
    const SHUFFLE_ROUND_COUNT: u8 = 90;
    const SLOTS_PER_EPOCH: u64 = 32;
    const TARGET_COMMITTEE_SIZE: u64 = 128;
}

/// [Minimal preset](https://github.com/ethereum/consensus-specs/tree/dev/presets/minimal).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Minimal;

impl Preset for Minimal {
    type EpochsPerHistoricalVector = U64;
    type EpochsPerSlashingsVector = U64;
    type HistoricalRootsLimit = U16777216;
    type MaxAttestations = U128;
    type MaxAttesterSlashings = U2;
    type MaxDeposits = U16;
    type MaxPendingAttestations = U1024;
    type MaxProposerSlashings = U16;
    type MaxValidatorsPerCommittee = U2048;
    type MaxVoluntaryExits = U16;
    type SlotsPerEth1VotingPeriod = U32;
    type SlotsPerHistoricalRoot = U64;
    type ValidatorRegistryLimit = U1099511627776;

    type SyncCommitteeSize = U32;

    type BytesPerLogsBloom = U256;
    type MaxBytesPerTransaction = U1073741824;
    type MaxExtraDataBytes = U32;
    type MaxTransactionsPerPayload = U1048576;

    const NAME: &'static str = "minimal";

    const EPOCHS_PER_ETH1_VOTING_PERIOD: u64 = 4;
    const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: u64 = 8;
    const INACTIVITY_PENALTY_QUOTIENT: u64 = 1 << 25;
    const MAX_COMMITTEES_PER_SLOT: u64 = 4;
    const MIN_SLASHING_PENALTY_QUOTIENT: u64 = 64;
    const PROPORTIONAL_SLASHING_MULTIPLIER: u64 = 2;
    const SHUFFLE_ROUND_COUNT: u8 = 10;
    const SLOTS_PER_EPOCH: u64 = 8;
    const TARGET_COMMITTEE_SIZE: u64 = 4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_attestation_limit_covers_an_epoch_of_attestations() {
        fn check<P: Preset>() {
            assert_eq!(
                P::MaxPendingAttestations::U64,
                P::MaxAttestations::U64 * P::SLOTS_PER_EPOCH
            );
            assert_eq!(
                P::SLOTS_PER_ETH1_VOTING_PERIOD,
                P::EPOCHS_PER_ETH1_VOTING_PERIOD * P::SLOTS_PER_EPOCH
            );
        }
        check::<Mainnet>();
        check::<Minimal>();
    }

    #[test]
    fn presets_differ_where_expected() {
        assert_eq!(Mainnet::SLOTS_PER_HISTORICAL_ROOT, 8192);
        assert_eq!(Minimal::SLOTS_PER_HISTORICAL_ROOT, 64);
        assert_eq!(Minimal::EPOCHS_PER_SLASHINGS_VECTOR, 64);
        assert_eq!(Mainnet::SYNC_COMMITTEE_SIZE, 512);
    }
}
