use alloy_primitives::B256;
use ember_bls::BLSError;
use ember_network_spec::ForkName;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateTransitionError {
    #[error("target slot {target} is not after state slot {state}")]
    SlotNotInFuture { state: u64, target: u64 },
    #[error("block state root {block} does not match computed root {computed}")]
    StateRootMismatch { block: B256, computed: B256 },
    #[error("block processing failed: {0}")]
    Block(#[from] BlockProcessingError),
    #[error("epoch processing failed: {0}")]
    Epoch(#[from] EpochProcessingError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("fork upgrade failed: {0}")]
    Upgrade(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum BlockProcessingError {
    #[error("block is for fork {block:?} but state is at fork {state:?}")]
    ForkMismatch { block: ForkName, state: ForkName },
    #[error("block slot {block} does not match state slot {state}")]
    SlotMismatch { block: u64, state: u64 },
    #[error("block slot {block} is not newer than latest header slot {latest}")]
    BlockNotNewer { block: u64, latest: u64 },
    #[error("proposer index {actual} does not match expected proposer {expected}")]
    ProposerIndexMismatch { actual: u64, expected: u64 },
    #[error("parent root {actual} does not match latest block header root {expected}")]
    ParentRootMismatch { actual: B256, expected: B256 },
    #[error("proposer {0} is slashed")]
    ProposerSlashed(u64),
    #[error("block contains {actual} deposits, expected {expected}")]
    DepositCountMismatch { actual: u64, expected: u64 },
    #[error("proposer slashing {index}: {reason}")]
    ProposerSlashing {
        index: usize,
        #[source]
        reason: ProposerSlashingError,
    },
    #[error("attester slashing {index}: {reason}")]
    AttesterSlashing {
        index: usize,
        #[source]
        reason: AttesterSlashingError,
    },
    #[error("attestation {index}: {reason}")]
    Attestation {
        index: usize,
        #[source]
        reason: AttestationError,
    },
    #[error("deposit {index}: {reason}")]
    Deposit {
        index: usize,
        #[source]
        reason: DepositError,
    },
    #[error("voluntary exit {index}: {reason}")]
    VoluntaryExit {
        index: usize,
        #[source]
        reason: VoluntaryExitError,
    },
    #[error(transparent)]
    SyncAggregate(#[from] SyncAggregateError),
    #[error(transparent)]
    ExecutionPayload(#[from] ExecutionPayloadError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Why an `IndexedAttestation` is malformed.
#[derive(Error, Debug)]
pub enum IndexedAttestationError {
    #[error("attesting indices are empty")]
    EmptyIndices,
    #[error("attesting indices are not sorted and unique")]
    UnsortedIndices,
    #[error("unknown validator {0}")]
    UnknownValidator(u64),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum AttestationError {
    #[error("target epoch {target} is neither the previous ({previous}) nor current ({current}) epoch")]
    BadTargetEpoch {
        target: u64,
        previous: u64,
        current: u64,
    },
    #[error("target epoch {target} does not contain slot {slot}")]
    TargetEpochSlotMismatch { target: u64, slot: u64 },
    #[error("attestation for slot {slot} included too early at state slot {state_slot}")]
    IncludedTooEarly { slot: u64, state_slot: u64 },
    #[error("attestation for slot {slot} included too late at state slot {state_slot}")]
    IncludedTooLate { slot: u64, state_slot: u64 },
    #[error("committee index {index} is not below committee count {count}")]
    BadCommitteeIndex { index: u64, count: u64 },
    #[error("source checkpoint does not match the justified checkpoint")]
    WrongSource,
    #[error(transparent)]
    Invalid(#[from] IndexedAttestationError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum AttesterSlashingError {
    #[error("attestation data is neither a double vote nor a surround vote")]
    NotSlashable,
    #[error("first attestation is invalid: {0}")]
    InvalidAttestation1(#[source] IndexedAttestationError),
    #[error("second attestation is invalid: {0}")]
    InvalidAttestation2(#[source] IndexedAttestationError),
    #[error("no slashable validator in the attesting index intersection")]
    NoSlashableIndices,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ProposerSlashingError {
    #[error("header slots differ: {0} and {1}")]
    SlotMismatch(u64, u64),
    #[error("header proposers differ: {0} and {1}")]
    ProposerMismatch(u64, u64),
    #[error("headers are identical")]
    SameHeaders,
    #[error("unknown proposer {0}")]
    UnknownValidator(u64),
    #[error("proposer {0} is not slashable")]
    NotSlashable(u64),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum DepositError {
    #[error("merkle proof for deposit index {0} does not match the eth1 deposit root")]
    InvalidProof(u64),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum VoluntaryExitError {
    #[error("unknown validator {0}")]
    UnknownValidator(u64),
    #[error("validator {0} is not active")]
    NotActive(u64),
    #[error("validator {0} has already initiated exit")]
    AlreadyExited(u64),
    #[error("exit epoch {epoch} is after the current epoch {current}")]
    FutureEpoch { epoch: u64, current: u64 },
    #[error("validator activated at epoch {activation_epoch} cannot exit before epoch {earliest}")]
    TooYoung { activation_epoch: u64, earliest: u64 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum SyncAggregateError {
    #[error("sync aggregate without participants must carry the infinity signature")]
    NonEmptySignature,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ExecutionPayloadError {
    #[error("payload parent hash {actual} does not match latest block hash {expected}")]
    ParentHashMismatch { actual: B256, expected: B256 },
    #[error("payload prev_randao {actual} does not match randao mix {expected}")]
    PrevRandaoMismatch { actual: B256, expected: B256 },
    #[error("payload timestamp {actual} does not match slot time {expected}")]
    TimestampMismatch { actual: u64, expected: u64 },
    #[error("execution engine rejected payload {0}")]
    InvalidPayload(B256),
    #[error("execution engine failed: {0}")]
    Engine(#[source] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("batch of {0} signature sets failed verification")]
    InvalidSignatures(usize),
    #[error(transparent)]
    Bls(#[from] BLSError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum EpochProcessingError {
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
