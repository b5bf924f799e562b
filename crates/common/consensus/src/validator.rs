use alloy_primitives::B256;
use anyhow::{anyhow, ensure};
use ember_bls::PubKey;
use ember_persistent::{PersistentList, diff::modified_records};
use serde::{Deserialize, Serialize};
use ssz::Decode;
use ssz_derive::{Decode, Encode};
use ssz_types::typenum::Unsigned;
use tree_hash_derive::TreeHash;

use crate::constants::{
    ETH1_ADDRESS_WITHDRAWAL_PREFIX, FAR_FUTURE_EPOCH, MAX_EFFECTIVE_BALANCE,
};

/// Serialized size of one [`Validator`].
pub const VALIDATOR_RECORD_SIZE: usize = 121;

#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Validator {
    pub pubkey: PubKey,

    /// Commitment to pubkey for withdrawals
    pub withdrawal_credentials: B256,

    /// Balance at stake
    #[serde(with = "serde_utils::quoted_u64")]
    pub effective_balance: u64,
    pub slashed: bool,

    /// When criteria for activation were met
    #[serde(with = "serde_utils::quoted_u64")]
    pub activation_eligibility_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub activation_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub exit_epoch: u64,

    /// When validator can withdraw funds
    #[serde(with = "serde_utils::quoted_u64")]
    pub withdrawable_epoch: u64,
}

impl Validator {
    /// A freshly deposited validator with every lifecycle epoch unset.
    pub fn from_deposit(
        pubkey: PubKey,
        withdrawal_credentials: B256,
        effective_balance: u64,
    ) -> Self {
        Self {
            pubkey,
            withdrawal_credentials,
            effective_balance,
            slashed: false,
            activation_eligibility_epoch: FAR_FUTURE_EPOCH,
            activation_epoch: FAR_FUTURE_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        }
    }

    /// Check if ``validator`` has an 0x01 prefixed "eth1" withdrawal credential.
    pub fn has_eth1_withdrawal_credential(&self) -> bool {
        &self.withdrawal_credentials[..1] == ETH1_ADDRESS_WITHDRAWAL_PREFIX
    }

    pub fn is_slashable_validator(&self, epoch: u64) -> bool {
        !self.slashed && self.activation_epoch <= epoch && epoch < self.withdrawable_epoch
    }

    pub fn is_active_validator(&self, epoch: u64) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }

    /// Check if ``validator`` is eligible to be placed into the activation queue.
    pub fn is_eligible_for_activation_queue(&self) -> bool {
        self.activation_eligibility_epoch == FAR_FUTURE_EPOCH
            && self.effective_balance == MAX_EFFECTIVE_BALANCE
    }

    /// Check if ``validator`` is eligible for activation.
    pub fn is_eligible_for_activation(&self, finalized_epoch: u64) -> bool {
        // Placement in queue is finalized
        self.activation_eligibility_epoch <= finalized_epoch
            // Has not yet been activated
            && self.activation_epoch == FAR_FUTURE_EPOCH
    }
}

/// Indices of validators whose serialized record differs between two registry images.
///
/// Both images are the SSZ encoding of a validator list. Validators appended in `current`
/// are reported as modified.
pub fn modified_validator_indices(previous: &[u8], current: &[u8]) -> Vec<usize> {
    modified_records(previous, current, VALIDATOR_RECORD_SIZE)
}

/// Decodes `current_bytes` into a validator list that shares every unchanged validator with
/// `previous`.
///
/// `previous_bytes` must be the encoding of `previous`. When the registry shrank the images
/// are unrelated and the list is decoded from scratch.
pub fn reload_validators<N: Unsigned>(
    previous: &PersistentList<Validator, N>,
    previous_bytes: &[u8],
    current_bytes: &[u8],
) -> anyhow::Result<PersistentList<Validator, N>> {
    ensure!(
        current_bytes.len() % VALIDATOR_RECORD_SIZE == 0,
        "Validator registry length {} is not a multiple of {VALIDATOR_RECORD_SIZE}",
        current_bytes.len()
    );
    if previous_bytes.len() != previous.len() * VALIDATOR_RECORD_SIZE {
        return Err(anyhow!("Previous registry bytes do not match the previous list"));
    }
    if current_bytes.len() < previous_bytes.len() {
        return PersistentList::from_ssz_bytes(current_bytes)
            .map_err(|err| anyhow!("Failed to decode validators: {err:?}"));
    }

    let mut validators = previous.clone();
    for index in modified_validator_indices(previous_bytes, current_bytes) {
        let start = index * VALIDATOR_RECORD_SIZE;
        let validator =
            Validator::from_ssz_bytes(&current_bytes[start..start + VALIDATOR_RECORD_SIZE])
                .map_err(|err| anyhow!("Failed to decode validator {index}: {err:?}"))?;
        match validators.get_mut(index) {
            Some(slot) => *slot = validator,
            None => validators.push(validator)?,
        }
    }
    Ok(validators)
}

#[cfg(test)]
mod tests {
    use ssz::Encode;
    use ssz_types::typenum::U1099511627776;
    use tree_hash::TreeHash;

    use super::*;

    type Registry = PersistentList<Validator, U1099511627776>;

    fn validator(seed: u8) -> Validator {
        let mut validator = Validator::from_deposit(
            PubKey::from_bytes(&[seed; 48]).expect("48 bytes"),
            B256::repeat_byte(seed),
            MAX_EFFECTIVE_BALANCE,
        );
        validator.activation_epoch = 0;
        validator
    }

    #[test]
    fn record_size_matches_encoding() {
        assert_eq!(validator(1).as_ssz_bytes().len(), VALIDATOR_RECORD_SIZE);
    }

    #[test]
    fn lifecycle_predicates() {
        let mut validator = validator(1);
        validator.exit_epoch = 10;
        validator.withdrawable_epoch = 20;
        assert!(validator.is_active_validator(9));
        assert!(!validator.is_active_validator(10));
        assert!(validator.is_slashable_validator(15));
        assert!(!validator.is_slashable_validator(20));
        validator.slashed = true;
        assert!(!validator.is_slashable_validator(15));

        let fresh = Validator::from_deposit(PubKey::default(), B256::ZERO, MAX_EFFECTIVE_BALANCE);
        assert!(fresh.is_eligible_for_activation_queue());
        assert!(!fresh.is_eligible_for_activation(100));
    }

    #[test]
    fn reload_shares_unchanged_validators() {
        let previous = Registry::new((0..40).map(validator).collect()).expect("within limit");
        let previous_bytes = previous.as_ssz_bytes();

        let mut current = previous.to_vec();
        current[7].slashed = true;
        current.push(validator(200));
        let current_bytes = current.as_ssz_bytes();

        assert_eq!(
            modified_validator_indices(&previous_bytes, &current_bytes),
            vec![7, 40]
        );

        let reloaded =
            reload_validators(&previous, &previous_bytes, &current_bytes).expect("reloads");
        let decoded = Registry::from_ssz_bytes(&current_bytes).expect("decodes");
        assert_eq!(reloaded, decoded);
        assert_eq!(reloaded.tree_hash_root(), decoded.tree_hash_root());
        assert_eq!(previous.get(7).map(|v| v.slashed), Some(false));
    }

    #[test]
    fn reload_rejects_truncated_records() {
        let previous = Registry::default();
        assert!(reload_validators(&previous, &[], &[0u8; 100]).is_err());
    }
}
