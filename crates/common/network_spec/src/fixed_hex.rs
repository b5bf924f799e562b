//! `0x`-prefixed hex for fixed byte strings in YAML configs, where a bare `0x01000000` would
//! otherwise be read as an integer.

use alloy_primitives::FixedBytes;
use serde::{Deserializer, Serializer};
use serde_utils::hex::{self, PrefixedHexVisitor};

pub fn serialize<S, const N: usize>(bytes: &FixedBytes<N>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<FixedBytes<N>, D::Error>
where
    D: Deserializer<'de>,
{
    let decoded = deserializer.deserialize_str(PrefixedHexVisitor)?;
    FixedBytes::try_from(decoded.as_slice()).map_err(serde::de::Error::custom)
}
