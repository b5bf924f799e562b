use crate::{PubKey, errors::BLSError, signature::BLSSignature};

pub trait Aggregatable<T> {
    type Error;

    fn aggregate(items: &[&T]) -> Result<T, Self::Error>;
}

pub trait Verifiable {
    type Error;

    /// Verifies a BLS signature against a public key and message.
    ///
    /// Returns `Ok(false)` when the pairing check fails and `Err` when the signature or
    /// public key bytes do not decode to valid curve points.
    fn verify(&self, pubkey: &PubKey, message: &[u8]) -> Result<bool, Self::Error>;

    /// Verifies the signature against a message using an aggregate of multiple public keys.
    fn fast_aggregate_verify<'a, P>(&self, pubkeys: P, message: &[u8]) -> Result<bool, Self::Error>
    where
        P: AsRef<[&'a PubKey]>;
}

pub trait Signable {
    type Error;

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error>;
}

pub trait SupranationalVerifiable: Verifiable<Error = BLSError> {}
pub trait SupranationalAggregatable<T>: Aggregatable<T, Error = anyhow::Error> {}
