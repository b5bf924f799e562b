use alloy_primitives::B256;
use blst::{
    BLST_ERROR,
    min_pk::{AggregatePublicKey as BlstAggregatePublicKey, PublicKey as BlstPublicKey},
};

use crate::{PubKey, constants::DST, errors::BLSError, signature::BLSSignature};

/// The public key side of a signature set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningKeys {
    Single(PubKey),
    /// Keys whose aggregate signed the message, e.g. the attesters of an aggregate attestation.
    Multiple(Vec<PubKey>),
}

/// A pending `(pubkeys, signing root, signature)` check.
///
/// Sets are owned so that a batch can be moved onto a worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    pub signing_keys: SigningKeys,
    pub signing_root: B256,
    pub signature: BLSSignature,
}

impl SignatureSet {
    pub fn single(pubkey: PubKey, signing_root: B256, signature: BLSSignature) -> Self {
        Self {
            signing_keys: SigningKeys::Single(pubkey),
            signing_root,
            signature,
        }
    }

    pub fn multiple(pubkeys: Vec<PubKey>, signing_root: B256, signature: BLSSignature) -> Self {
        Self {
            signing_keys: SigningKeys::Multiple(pubkeys),
            signing_root,
            signature,
        }
    }

    /// The validated public key the signature is checked against.
    pub(crate) fn blst_public_key(&self) -> Result<BlstPublicKey, BLSError> {
        match &self.signing_keys {
            SigningKeys::Single(pubkey) => pubkey.to_validated_blst_pubkey(),
            SigningKeys::Multiple(pubkeys) => {
                if pubkeys.is_empty() {
                    return Err(BLSError::InvalidPublicKey);
                }
                let public_keys = pubkeys
                    .iter()
                    .map(PubKey::to_blst_pubkey)
                    .collect::<Result<Vec<_>, _>>()?;
                let aggregate = BlstAggregatePublicKey::aggregate(
                    &public_keys.iter().collect::<Vec<_>>(),
                    true,
                )
                .map_err(BLSError::Blst)?;
                Ok(aggregate.to_public_key())
            }
        }
    }

    /// Checks this set on its own. Undecodable keys or signatures verify as `false`.
    pub fn verify(&self) -> bool {
        let (Ok(public_key), Ok(signature)) =
            (self.blst_public_key(), self.signature.to_blst_signature())
        else {
            return false;
        };
        signature.verify(
            true,
            self.signing_root.as_slice(),
            DST,
            &[],
            &public_key,
            false,
        ) == BLST_ERROR::BLST_SUCCESS
    }
}
