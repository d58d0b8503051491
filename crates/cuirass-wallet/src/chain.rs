//! Deterministic chained key derivation.
//!
//! Each child private key is derived from its parent by a public, reversible
//! rule: hash the parent's serialized public key, XOR the digest with the
//! wallet chaincode, and multiply the parent scalar by the result mod N.
//! Anyone holding the parent public key and the chaincode can therefore
//! derive the child public key, while the child private key needs the
//! parent private key.

use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{FieldBytes, Scalar, U256};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use cuirass_core::{CryptoError, PrivateKey};

use crate::error::WalletError;

/// Derive a child private-key scalar from its parent.
///
/// `parent_pub` must be a 33- or 65-byte SEC1 encoding when present; when
/// absent it is derived compressed from `parent_priv`. The child is
/// `((SHA256(parent_pub) XOR chaincode) · parent_priv) mod N`, returned as
/// 32 big-endian bytes.
///
/// The astronomically unlikely zero child scalar is not special-cased here;
/// constructing a [`PrivateKey`] from the result rejects it.
pub fn chained_priv_key(
    parent_priv: &[u8; 32],
    parent_pub: Option<&[u8]>,
    chaincode: &[u8; 32],
) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let parent_scalar =
        Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(*parent_priv)))
            .filter(|s| !bool::from(s.is_zero()))
            .ok_or(CryptoError::InvalidPrivateKey)?;

    let pub_bytes = match parent_pub {
        Some(bytes) => {
            if bytes.len() != 33 && bytes.len() != 65 {
                return Err(CryptoError::InvalidPublicKey.into());
            }
            bytes.to_vec()
        }
        None => {
            let parent = PrivateKey::from_bytes(parent_priv)?;
            parent.public_key().serialize(true)
        }
    };

    let digest = Sha256::digest(&pub_bytes);
    let mut mask = [0u8; 32];
    for (m, (d, c)) in mask.iter_mut().zip(digest.iter().zip(chaincode)) {
        *m = d ^ c;
    }

    let mask_scalar = <Scalar as Reduce<U256>>::reduce_bytes(&mask.into());
    let child = mask_scalar * parent_scalar;

    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(&child.to_bytes());
    Ok(out)
}
