//! secp256k1 keypair wrappers.
//!
//! Wraps `k256` for scalar-base multiplication, SEC1 point serialization in
//! both compressed and uncompressed form, and the ECDSA smoke test used to
//! detect decryption corruption. Secret scalars are zeroized on drop by the
//! underlying library.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hash;
use crate::types::Hash160;

/// Fixed message signed and verified to prove a decrypted private key still
/// matches its stored public key.
pub const KEYPAIR_PROBE: &[u8] = b"String to sign.";

/// A secp256k1 private key scalar.
///
/// Rejects zero and non-canonical scalars at construction. The scalar is
/// zeroized when the key is dropped.
#[derive(Clone)]
pub struct PrivateKey {
    inner: k256::SecretKey,
}

impl PrivateKey {
    /// Generate a random private key from the OS cryptographic RNG.
    pub fn random() -> Self {
        Self {
            inner: k256::SecretKey::random(&mut OsRng),
        }
    }

    /// Create a private key from a 32-byte big-endian scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let inner =
            k256::SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { inner })
    }

    /// The scalar as 32 big-endian bytes. Handle with care.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.inner.to_bytes().into())
    }

    /// Derive the public key by scalar-base multiplication.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.public_key(),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("scalar", &"[REDACTED]")
            .finish()
    }
}

/// A secp256k1 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: k256::PublicKey,
}

impl PublicKey {
    /// Parse a SEC1-encoded point (33-byte compressed or 65-byte
    /// uncompressed).
    pub fn from_sec1(bytes: &[u8]) -> Result<Self, CryptoError> {
        let inner =
            k256::PublicKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { inner })
    }

    /// SEC1 encoding: 33 bytes compressed, 65 bytes uncompressed.
    pub fn serialize(&self, compressed: bool) -> Vec<u8> {
        self.inner.to_encoded_point(compressed).as_bytes().to_vec()
    }

    /// HASH160 of the chosen SEC1 encoding.
    pub fn hash160(&self, compressed: bool) -> Hash160 {
        hash::hash160(&self.serialize(compressed))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.serialize(true)))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.serialize(true)))
    }
}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.serialize(true).hash(state);
    }
}

/// SEC1-encode the public key of a private scalar.
pub fn pubkey_from_privkey(key: &PrivateKey, compressed: bool) -> Vec<u8> {
    key.public_key().serialize(compressed)
}

/// Prove that a private key and a stored public key form a pair.
///
/// ECDSA-signs [`KEYPAIR_PROBE`] with the private key and verifies the
/// signature against the stored public key. Fails with
/// [`CryptoError::VerificationFailed`] when the pair is inconsistent, e.g.
/// after decrypting a key record with the wrong AES key.
pub fn verify_keypair(key: &PrivateKey, pubkey: &PublicKey) -> Result<(), CryptoError> {
    let signing = SigningKey::from(key.inner.clone());
    let signature: Signature = signing.sign(KEYPAIR_PROBE);
    let verifying = VerifyingKey::from(&pubkey.inner);
    verifying
        .verify(KEYPAIR_PROBE, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}
