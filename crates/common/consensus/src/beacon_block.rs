use alloy_primitives::B256;
use anyhow::anyhow;
use ember_bls::BLSSignature;
use ember_network_spec::{ForkName, NetworkSpec};
use serde::{Deserialize, Serialize};
use ssz::{Decode, Encode};
use tree_hash::TreeHash;

use crate::{
    altair,
    beacon_block_header::{BeaconBlockHeader, SignedBeaconBlockHeader},
    bellatrix,
    misc::compute_epoch_at_slot,
    phase0,
    preset::Preset,
};

/// Byte offset of `message.slot` in a signed block: the message offset and the signature
/// precede it.
pub const SIGNED_BLOCK_SLOT_OFFSET: usize = 100;

/// A signed beacon block of any supported fork.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(bound = "", tag = "version", content = "data", rename_all = "lowercase")]
pub enum SignedBeaconBlock<P: Preset> {
    Phase0(phase0::beacon_block::SignedBeaconBlock<P>),
    Altair(altair::beacon_block::SignedBeaconBlock<P>),
    Bellatrix(bellatrix::beacon_block::SignedBeaconBlock<P>),
}

macro_rules! block_dispatch {
    ($value:expr, $block:ident => $body:expr) => {
        match $value {
            SignedBeaconBlock::Phase0($block) => $body,
            SignedBeaconBlock::Altair($block) => $body,
            SignedBeaconBlock::Bellatrix($block) => $body,
        }
    };
}

impl<P: Preset> SignedBeaconBlock<P> {
    /// Decodes a signed block, picking the fork that the schedule assigns to its slot.
    pub fn from_ssz_bytes(bytes: &[u8], spec: &NetworkSpec) -> anyhow::Result<Self> {
        let slot_bytes = bytes
            .get(SIGNED_BLOCK_SLOT_OFFSET..SIGNED_BLOCK_SLOT_OFFSET + 8)
            .ok_or_else(|| anyhow!("Block is too short to hold a slot: {} bytes", bytes.len()))?;
        let slot = u64::from_ssz_bytes(slot_bytes)
            .map_err(|err| anyhow!("Failed to decode block slot: {err:?}"))?;

        Ok(match spec.fork_at_epoch(compute_epoch_at_slot::<P>(slot)) {
            ForkName::Phase0 => Self::Phase0(
                phase0::beacon_block::SignedBeaconBlock::from_ssz_bytes(bytes)
                    .map_err(|err| anyhow!("Failed to decode phase0 block: {err:?}"))?,
            ),
            ForkName::Altair => Self::Altair(
                altair::beacon_block::SignedBeaconBlock::from_ssz_bytes(bytes)
                    .map_err(|err| anyhow!("Failed to decode altair block: {err:?}"))?,
            ),
            ForkName::Bellatrix => Self::Bellatrix(
                bellatrix::beacon_block::SignedBeaconBlock::from_ssz_bytes(bytes)
                    .map_err(|err| anyhow!("Failed to decode bellatrix block: {err:?}"))?,
            ),
        })
    }

    pub fn fork_name(&self) -> ForkName {
        match self {
            Self::Phase0(_) => ForkName::Phase0,
            Self::Altair(_) => ForkName::Altair,
            Self::Bellatrix(_) => ForkName::Bellatrix,
        }
    }

    pub fn slot(&self) -> u64 {
        block_dispatch!(self, block => block.message.slot)
    }

    pub fn proposer_index(&self) -> u64 {
        block_dispatch!(self, block => block.message.proposer_index)
    }

    pub fn parent_root(&self) -> B256 {
        block_dispatch!(self, block => block.message.parent_root)
    }

    pub fn state_root(&self) -> B256 {
        block_dispatch!(self, block => block.message.state_root)
    }

    pub fn signature(&self) -> &BLSSignature {
        block_dispatch!(self, block => &block.signature)
    }

    pub fn block_header(&self) -> BeaconBlockHeader {
        block_dispatch!(self, block => block.message.block_header())
    }

    pub fn signed_header(&self) -> SignedBeaconBlockHeader {
        block_dispatch!(self, block => block.signed_header())
    }

    /// Hash tree root of the unsigned message, the block's identity.
    pub fn message_root(&self) -> B256 {
        block_dispatch!(self, block => block.message.tree_hash_root())
    }
}

impl<P: Preset> From<phase0::beacon_block::SignedBeaconBlock<P>> for SignedBeaconBlock<P> {
    fn from(block: phase0::beacon_block::SignedBeaconBlock<P>) -> Self {
        Self::Phase0(block)
    }
}

impl<P: Preset> From<altair::beacon_block::SignedBeaconBlock<P>> for SignedBeaconBlock<P> {
    fn from(block: altair::beacon_block::SignedBeaconBlock<P>) -> Self {
        Self::Altair(block)
    }
}

impl<P: Preset> From<bellatrix::beacon_block::SignedBeaconBlock<P>> for SignedBeaconBlock<P> {
    fn from(block: bellatrix::beacon_block::SignedBeaconBlock<P>) -> Self {
        Self::Bellatrix(block)
    }
}

impl<P: Preset> Encode for SignedBeaconBlock<P> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        block_dispatch!(self, block => block.ssz_append(buf))
    }

    fn ssz_bytes_len(&self) -> usize {
        block_dispatch!(self, block => block.ssz_bytes_len())
    }
}

#[cfg(test)]
mod tests {
    use ember_network_spec::MINIMAL;
    use ssz_types::VariableList;

    use super::*;
    use crate::{eth_1_data::Eth1Data, preset::Minimal, sync_committee::SyncAggregate};

    fn altair_block(slot: u64) -> altair::beacon_block::SignedBeaconBlock<Minimal> {
        altair::beacon_block::SignedBeaconBlock {
            message: altair::beacon_block::BeaconBlock {
                slot,
                proposer_index: 7,
                parent_root: B256::repeat_byte(1),
                state_root: B256::repeat_byte(2),
                body: altair::beacon_block::BeaconBlockBody {
                    randao_reveal: BLSSignature::infinity(),
                    eth1_data: Eth1Data::default(),
                    graffiti: B256::ZERO,
                    proposer_slashings: VariableList::empty(),
                    attester_slashings: VariableList::empty(),
                    attestations: VariableList::empty(),
                    deposits: VariableList::empty(),
                    voluntary_exits: VariableList::empty(),
                    sync_aggregate: SyncAggregate::default(),
                },
            },
            signature: BLSSignature::infinity(),
        }
    }

    #[test]
    fn decodes_with_fork_from_slot() {
        let spec = MINIMAL.with_genesis_fork(ForkName::Altair);
        let block = SignedBeaconBlock::from(altair_block(21));
        let bytes = block.as_ssz_bytes();
        assert_eq!(
            u64::from_le_bytes(bytes[100..108].try_into().expect("8 bytes")),
            21
        );

        let decoded = SignedBeaconBlock::<Minimal>::from_ssz_bytes(&bytes, &spec)
            .expect("valid altair block");
        assert_eq!(decoded, block);
        assert_eq!(decoded.fork_name(), ForkName::Altair);
        assert_eq!(decoded.proposer_index(), 7);
        assert_eq!(decoded.block_header().body_root, block.block_header().body_root);
    }

    #[test]
    fn phase0_schedule_rejects_altair_body() {
        let block = SignedBeaconBlock::from(altair_block(21));
        assert!(SignedBeaconBlock::<Minimal>::from_ssz_bytes(&block.as_ssz_bytes(), &MINIMAL).is_err());
    }
}
