use alloy_primitives::B256;

/// A BLS secret key scalar in big-endian bytes.
#[derive(Debug, PartialEq, Clone, Default, Eq, Hash)]
pub struct PrivateKey {
    pub inner: B256,
}
