use blst::BLST_ERROR;
use thiserror::Error;

#[derive(Error, PartialEq, Debug, Clone)]
pub enum BLSError {
    #[error("signature set list is empty")]
    EmptySignatureSet,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid hex string")]
    InvalidHexString,
    #[error("invalid byte length")]
    InvalidByteLength,
    #[error("blst error: {0:?}")]
    Blst(BLST_ERROR),
    #[error("signature verification timed out")]
    VerificationTimedOut,
    #[error("verifier pool is closed")]
    PoolClosed,
    #[error("verification worker failed: {0}")]
    WorkerFailed(String),
}
