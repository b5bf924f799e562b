/// Domain separation tag of the proof-of-possession ciphersuite used by the beacon chain.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

pub const PUBKEY_BYTES_LEN: usize = 48;
pub const SIGNATURE_BYTES_LEN: usize = 96;

/// Bit width of the random scalars used to combine distinct-message pairings.
pub const RAND_BITS: usize = 64;
