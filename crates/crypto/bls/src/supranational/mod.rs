//! Conversions between the SSZ key/signature containers and the `blst` (supranational)
//! curve types.

pub mod aggregate_pubkey;
pub mod private_key;
pub mod pubkey;
pub mod signature;
