use anyhow::anyhow;
use blst::min_pk::{AggregatePublicKey as BlstAggregatePublicKey, PublicKey as BlstPublicKey};
use ssz_types::FixedVector;

use crate::{
    errors::BLSError,
    pubkey::PubKey,
    traits::{Aggregatable, SupranationalAggregatable},
};

impl From<BlstPublicKey> for PubKey {
    fn from(value: BlstPublicKey) -> Self {
        PubKey {
            inner: FixedVector::from(value.compress().to_vec()),
        }
    }
}

impl PubKey {
    /// Decompresses the key without the subgroup check.
    pub fn to_blst_pubkey(&self) -> Result<BlstPublicKey, BLSError> {
        BlstPublicKey::from_bytes(self.to_bytes()).map_err(BLSError::Blst)
    }

    /// Decompresses the key and rejects the identity and points outside the subgroup.
    pub fn to_validated_blst_pubkey(&self) -> Result<BlstPublicKey, BLSError> {
        let public_key = self.to_blst_pubkey()?;
        public_key.validate().map_err(BLSError::Blst)?;
        Ok(public_key)
    }
}

impl Aggregatable<PubKey> for PubKey {
    type Error = anyhow::Error;

    fn aggregate(public_keys: &[&PubKey]) -> anyhow::Result<PubKey> {
        let public_keys = public_keys
            .iter()
            .map(|public_key| public_key.to_blst_pubkey())
            .collect::<Result<Vec<_>, _>>()?;
        let aggregate_public_key =
            BlstAggregatePublicKey::aggregate(&public_keys.iter().collect::<Vec<_>>(), true)
                .map_err(|err| anyhow!("Failed to aggregate and validate public keys {err:?}"))?;
        Ok(PubKey::from(aggregate_public_key.to_public_key()))
    }
}

impl SupranationalAggregatable<PubKey> for PubKey {}
