//! Digest helpers shared by the wallet codecs.
//!
//! Every checksummed field in the wallet file carries the first four bytes
//! of its double-SHA-256, interpreted little-endian. Addresses are keyed by
//! HASH160 of the serialized public key.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::types::Hash160;

/// Double SHA-256.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// HASH160: RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> Hash160 {
    let sha = Sha256::digest(data);
    Hash160(Ripemd160::digest(sha).into())
}

/// Field checksum: first four bytes of double SHA-256, little-endian.
pub fn field_checksum(data: &[u8]) -> u32 {
    let digest = sha256d(data);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}
