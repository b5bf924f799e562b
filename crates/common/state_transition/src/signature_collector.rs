use ember_bls::{SignatureSet, VerifyOptions, verify_signature_sets};
use tracing::debug;

use crate::errors::SignatureError;

/// Accumulates the signature sets met while processing a block so they can be verified in
/// one batch at the end.
///
/// A disabled collector drops everything pushed to it except sets added with
/// [`SignatureCollector::push_required`].
#[derive(Debug)]
pub struct SignatureCollector {
    sets: Vec<SignatureSet>,
    enabled: bool,
}

impl Default for SignatureCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureCollector {
    pub fn new() -> Self {
        Self {
            sets: vec![],
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            sets: vec![],
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn push(&mut self, set: SignatureSet) {
        if self.enabled {
            self.sets.push(set);
        }
    }

    /// Pushes a set that is verified even when the collector is disabled.
    pub fn push_required(&mut self, set: SignatureSet) {
        self.sets.push(set);
    }

    /// Builds and pushes a set, skipping the build when the collector is disabled.
    pub fn push_with(
        &mut self,
        build: impl FnOnce() -> anyhow::Result<SignatureSet>,
    ) -> anyhow::Result<()> {
        if self.enabled {
            self.sets.push(build()?);
        }
        Ok(())
    }

    pub fn into_sets(self) -> Vec<SignatureSet> {
        self.sets
    }

    /// Verifies every collected set with a single call to the batch verifier.
    pub fn verify(self) -> Result<(), SignatureError> {
        if self.sets.is_empty() {
            return Ok(());
        }
        let count = self.sets.len();
        debug!(sets = count, "Verifying collected signature sets");
        if verify_signature_sets(&self.sets, VerifyOptions::default())? {
            Ok(())
        } else {
            Err(SignatureError::InvalidSignatures(count))
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use ember_bls::{PrivateKey, traits::Signable};

    use super::*;

    fn signed_set(seed: u8) -> SignatureSet {
        let private_key = PrivateKey::key_gen(&[seed; 32]).expect("valid ikm");
        let root = B256::repeat_byte(seed);
        let signature = private_key.sign(root.as_slice()).expect("signs");
        SignatureSet::single(private_key.public_key().expect("valid key"), root, signature)
    }

    #[test]
    fn empty_collector_verifies() {
        assert!(SignatureCollector::new().verify().is_ok());
    }

    #[test]
    fn disabled_collector_ignores_sets() {
        let mut collector = SignatureCollector::disabled();
        collector.push(signed_set(1));
        collector
            .push_with(|| anyhow::bail!("never built"))
            .expect("build skipped");
        assert!(collector.is_empty());
    }

    #[test]
    fn required_sets_survive_a_disabled_collector() {
        let mut collector = SignatureCollector::disabled();
        collector.push(signed_set(1));
        let mut forged = signed_set(2);
        forged.signature = signed_set(3).signature;
        collector.push_required(forged);
        assert_eq!(collector.len(), 1);
        assert!(matches!(
            collector.verify(),
            Err(SignatureError::InvalidSignatures(1))
        ));
    }

    #[test]
    fn one_bad_set_fails_the_batch() {
        let mut collector = SignatureCollector::new();
        for seed in 1..4 {
            collector.push(signed_set(seed));
        }
        let mut bad = signed_set(4);
        bad.signing_root = B256::ZERO;
        collector.push(bad);

        assert!(matches!(
            collector.verify(),
            Err(SignatureError::InvalidSignatures(4))
        ));
    }
}
