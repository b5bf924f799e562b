pub mod aggregate_pubkey;
pub mod batch;
pub mod constants;
pub mod errors;
pub mod private_key;
pub mod pubkey;
pub mod signature;
pub mod signature_set;
pub mod supranational;
pub mod traits;
pub mod verifier_pool;

pub use aggregate_pubkey::AggregatePubKey;
pub use batch::{VerifyOptions, verify_signature_sets};
pub use errors::BLSError;
pub use private_key::PrivateKey;
pub use pubkey::PubKey;
pub use signature::BLSSignature;
pub use signature_set::{SignatureSet, SigningKeys};
pub use verifier_pool::{VerificationJob, VerifierPool};
