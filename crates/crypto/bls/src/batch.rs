use blst::{
    BLST_ERROR, blst_scalar,
    min_pk::{
        AggregatePublicKey as BlstAggregatePublicKey, AggregateSignature as BlstAggregateSignature,
        Signature as BlstSignature,
    },
};
use rand::Rng;
use tracing::warn;

use crate::{
    constants::{DST, RAND_BITS},
    errors::BLSError,
    signature_set::SignatureSet,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Every set signs the same root, so keys and signatures can be aggregated up front.
    pub is_same_message: bool,
}

impl VerifyOptions {
    pub fn same_message() -> Self {
        Self {
            is_same_message: true,
        }
    }
}

/// Verifies a list of signature sets, returning `true` only if every set is valid.
///
/// An empty list is a caller error. Malformed keys or signatures make the result `false`
/// instead of an error, and the outcome never depends on which strategy was used.
pub fn verify_signature_sets(
    sets: &[SignatureSet],
    options: VerifyOptions,
) -> Result<bool, BLSError> {
    if sets.is_empty() {
        return Err(BLSError::EmptySignatureSet);
    }

    if sets.len() < 2 {
        return Ok(sets.iter().all(SignatureSet::verify));
    }

    if options.is_same_message {
        let signing_root = sets[0].signing_root;
        if sets.iter().all(|set| set.signing_root == signing_root) {
            return Ok(verify_same_message(sets));
        }
        warn!(
            sets = sets.len(),
            "Signature sets marked as same-message have different signing roots, verifying as distinct messages"
        );
    }

    Ok(verify_distinct_messages(sets))
}

fn verify_same_message(sets: &[SignatureSet]) -> bool {
    let Ok(public_keys) = sets
        .iter()
        .map(SignatureSet::blst_public_key)
        .collect::<Result<Vec<_>, _>>()
    else {
        return false;
    };
    let Ok(signatures) = sets
        .iter()
        .map(|set| set.signature.to_blst_signature())
        .collect::<Result<Vec<_>, _>>()
    else {
        return false;
    };

    let Ok(public_key) =
        BlstAggregatePublicKey::aggregate(&public_keys.iter().collect::<Vec<_>>(), false)
    else {
        return false;
    };
    let Ok(signature) =
        BlstAggregateSignature::aggregate(&signatures.iter().collect::<Vec<_>>(), true)
    else {
        return false;
    };

    signature.to_signature().verify(
        false,
        sets[0].signing_root.as_slice(),
        DST,
        &[],
        &public_key.to_public_key(),
        false,
    ) == BLST_ERROR::BLST_SUCCESS
}

fn verify_distinct_messages(sets: &[SignatureSet]) -> bool {
    let Ok(public_keys) = sets
        .iter()
        .map(SignatureSet::blst_public_key)
        .collect::<Result<Vec<_>, _>>()
    else {
        return false;
    };
    let Ok(signatures) = sets
        .iter()
        .map(|set| set.signature.to_blst_signature())
        .collect::<Result<Vec<BlstSignature>, _>>()
    else {
        return false;
    };

    let mut rng = rand::rng();
    let scalars = sets
        .iter()
        .map(|_| {
            let mut scalar = blst_scalar::default();
            scalar.b[..8].copy_from_slice(&rng.random_range(1..=u64::MAX).to_le_bytes());
            scalar
        })
        .collect::<Vec<_>>();
    let messages = sets
        .iter()
        .map(|set| set.signing_root.as_slice())
        .collect::<Vec<_>>();

    BlstSignature::verify_multiple_aggregate_signatures(
        &messages,
        DST,
        &public_keys.iter().collect::<Vec<_>>(),
        false,
        &signatures.iter().collect::<Vec<_>>(),
        true,
        &scalars,
        RAND_BITS,
    ) == BLST_ERROR::BLST_SUCCESS
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use rstest::rstest;
    use tracing_test::traced_test;

    use super::*;
    use crate::{BLSSignature, PrivateKey, PubKey, traits::Signable};

    fn signer(seed: u8) -> (PrivateKey, PubKey) {
        let private_key = PrivateKey::key_gen(&[seed; 32]).expect("valid ikm");
        let public_key = private_key.public_key().expect("valid key");
        (private_key, public_key)
    }

    fn signed_set(seed: u8, root: B256) -> SignatureSet {
        let (private_key, public_key) = signer(seed);
        let signature = private_key.sign(root.as_slice()).expect("signs");
        SignatureSet::single(public_key, root, signature)
    }

    fn distinct_sets(count: u8) -> Vec<SignatureSet> {
        (1..=count)
            .map(|seed| signed_set(seed, B256::repeat_byte(seed)))
            .collect()
    }

    fn same_message_sets(count: u8) -> Vec<SignatureSet> {
        (1..=count)
            .map(|seed| signed_set(seed, B256::repeat_byte(0xaa)))
            .collect()
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(
            verify_signature_sets(&[], VerifyOptions::default()),
            Err(BLSError::EmptySignatureSet)
        );
    }

    #[rstest]
    #[case::single(distinct_sets(1), VerifyOptions::default())]
    #[case::distinct(distinct_sets(5), VerifyOptions::default())]
    #[case::same_message(same_message_sets(5), VerifyOptions::same_message())]
    #[case::same_message_via_distinct_path(same_message_sets(4), VerifyOptions::default())]
    fn valid_sets_verify(#[case] sets: Vec<SignatureSet>, #[case] options: VerifyOptions) {
        assert_eq!(verify_signature_sets(&sets, options), Ok(true));
    }

    #[rstest]
    #[case::distinct(distinct_sets(5), VerifyOptions::default())]
    #[case::same_message(same_message_sets(5), VerifyOptions::same_message())]
    fn batch_matches_individual_results(
        #[case] mut sets: Vec<SignatureSet>,
        #[case] options: VerifyOptions,
    ) {
        let individually = |sets: &[SignatureSet]| {
            sets.iter()
                .all(|set| verify_signature_sets(std::slice::from_ref(set), options) == Ok(true))
        };
        assert!(individually(&sets));
        assert_eq!(verify_signature_sets(&sets, options), Ok(true));

        // The third signer signs some other root.
        let (private_key, _) = signer(3);
        sets[2].signature = private_key.sign(&[0xee; 32]).expect("signs");

        assert!(!individually(&sets));
        assert_eq!(verify_signature_sets(&sets, options), Ok(false));
    }

    #[test]
    fn malformed_signature_is_false() {
        let mut sets = distinct_sets(3);
        sets[2].signature = BLSSignature::default();
        assert_eq!(
            verify_signature_sets(&sets, VerifyOptions::default()),
            Ok(false)
        );
        assert_eq!(
            verify_signature_sets(&sets[2..], VerifyOptions::default()),
            Ok(false)
        );
    }

    #[test]
    #[traced_test]
    fn mislabelled_same_message_falls_back_to_distinct() {
        let sets = distinct_sets(3);
        assert_eq!(
            verify_signature_sets(&sets, VerifyOptions::same_message()),
            Ok(true)
        );
        assert!(logs_contain("different signing roots"));
    }

    #[test]
    fn multiple_keys_verify_against_aggregate() {
        let root = B256::repeat_byte(7);
        let signers: Vec<_> = (1..=3).map(signer).collect();
        let signatures: Vec<_> = signers
            .iter()
            .map(|(private_key, _)| private_key.sign(root.as_slice()).expect("signs"))
            .collect();
        let signature = <BLSSignature as crate::traits::Aggregatable<BLSSignature>>::aggregate(
            &signatures.iter().collect::<Vec<_>>(),
        )
        .expect("aggregates");
        let set = SignatureSet::multiple(
            signers.into_iter().map(|(_, public_key)| public_key).collect(),
            root,
            signature,
        );

        assert!(set.verify());
        let mut sets = distinct_sets(2);
        sets.push(set);
        assert_eq!(
            verify_signature_sets(&sets, VerifyOptions::default()),
            Ok(true)
        );
    }
}
