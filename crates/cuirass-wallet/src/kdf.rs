//! Memory-hard passphrase key derivation.
//!
//! A sequential-memory-hard construction in the ROMix family, with SHA-512
//! as the inner hash: each iteration fills a `mem`-byte lookup table by
//! repeated hashing, then mixes the tail block against data-dependent table
//! reads for half as many rounds as the table has blocks. The 32-byte result
//! keys the AES cipher protecting every private key in the wallet.
//!
//! Parameters are chosen by wall-clock self-calibration at wallet creation
//! and persisted in a checksummed 256-byte region of the file header.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};
use std::io::{Read, Write};
use std::time::Instant;
use zeroize::{Zeroize, Zeroizing};

use crate::codec::{Reader, VersionedDecode, Writer};
use crate::error::WalletError;

/// Serialized size of the parameter region, padding included.
pub const KDF_REGION_LEN: usize = 256;

/// Smallest lookup table the calibrator will consider.
pub const MIN_KDF_MEM: u64 = 1024;

/// Largest lookup table the default calibration will grow to (32 MiB).
pub const DEFAULT_MAX_MEM: u64 = 32 * (1 << 20);

/// Default wall-clock target for a full derivation.
pub const DEFAULT_TARGET_SECS: f64 = 0.25;

/// Iteration-count calibration floor: `n_iter` doubles until a full
/// derivation takes at least this long.
const N_ITER_FLOOR_SECS: f64 = 0.02;

/// Parameters for the memory-hard derivation. Immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdfParams {
    mem: u64,
    n_iter: u32,
    salt: [u8; 32],
}

impl KdfParams {
    /// Build parameters, validating that `mem` is a positive multiple of 64
    /// and `n_iter` is nonzero.
    pub fn new(mem: u64, n_iter: u32, salt: [u8; 32]) -> Result<Self, WalletError> {
        if mem == 0 || mem % 64 != 0 {
            return Err(WalletError::Malformed(format!(
                "KDF memory {mem} is not a positive multiple of 64"
            )));
        }
        if n_iter == 0 {
            return Err(WalletError::Malformed(
                "KDF iteration count is zero".into(),
            ));
        }
        Ok(Self { mem, n_iter, salt })
    }

    /// Lookup table size in bytes.
    pub fn mem(&self) -> u64 {
        self.mem
    }

    /// Number of chained derivation iterations.
    pub fn n_iter(&self) -> u32 {
        self.n_iter
    }

    /// The 32-byte salt.
    pub fn salt(&self) -> &[u8; 32] {
        &self.salt
    }

    /// Self-calibrate parameters with the default 0.25 s target and 32 MiB
    /// memory cap.
    pub fn compute_default() -> Self {
        Self::compute(DEFAULT_TARGET_SECS, DEFAULT_MAX_MEM)
    }

    /// Self-calibrate parameters against a wall-clock target.
    ///
    /// The table size doubles from [`MIN_KDF_MEM`] while a single iteration
    /// finishes in under a quarter of the target and the cap is not reached;
    /// the iteration count then doubles until a full derivation takes at
    /// least the calibration floor. Best effort: the result may not hit the
    /// target exactly.
    pub fn compute(target_secs: f64, max_mem: u64) -> Self {
        let mut salt = [0u8; 32];
        OsRng.fill_bytes(&mut salt);
        let probe = b"calibration probe";

        let mut mem = MIN_KDF_MEM;
        loop {
            let start = Instant::now();
            let _ = key_one_iter(probe, &salt, mem);
            if start.elapsed().as_secs_f64() >= target_secs / 4.0 || mem >= max_mem {
                break;
            }
            mem *= 2;
        }

        let mut n_iter = 1u32;
        loop {
            let candidate = Self { mem, n_iter, salt };
            let start = Instant::now();
            let _ = candidate.derive_key(probe);
            if start.elapsed().as_secs_f64() >= N_ITER_FLOOR_SECS {
                break;
            }
            n_iter = n_iter.saturating_mul(2);
        }

        tracing::debug!(mem, n_iter, "calibrated KDF parameters");
        Self { mem, n_iter, salt }
    }

    /// Derive the 32-byte AES key from a passphrase.
    ///
    /// Folds the single-iteration function `n_iter` times, each round
    /// consuming the previous output as its input. The salt and table size
    /// stay fixed across rounds.
    pub fn derive_key(&self, passphrase: &[u8]) -> Zeroizing<[u8; 32]> {
        let mut out = key_one_iter(passphrase, &self.salt, self.mem);
        for _ in 1..self.n_iter {
            out = key_one_iter(&out[..], &self.salt, self.mem);
        }
        out
    }

    /// Serialize the parameter fields: loose `mem` and `n_iter` copies
    /// followed by the checksummed `mem || n_iter || salt` region. The
    /// container pads the result to [`KDF_REGION_LEN`].
    pub fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<(), WalletError> {
        w.write_u64(self.mem)?;
        w.write_u32(self.n_iter)?;
        let mut region = [0u8; 44];
        region[..8].copy_from_slice(&self.mem.to_le_bytes());
        region[8..12].copy_from_slice(&self.n_iter.to_le_bytes());
        region[12..].copy_from_slice(&self.salt);
        w.write_checked(&region)
    }
}

impl VersionedDecode for KdfParams {
    fn decode<R: Read>(r: &mut Reader<R>) -> Result<Self, WalletError> {
        // Loose copies of mem and n_iter precede the checksummed region.
        // The region is the authoritative payload.
        let _loose_mem = r.read_u64()?;
        let _loose_n_iter = r.read_u32()?;
        let region = r.read_checked::<44>("kdf parameters")?;
        let mem = u64::from_le_bytes(region[..8].try_into().expect("8-byte slice"));
        let n_iter = u32::from_le_bytes(region[8..12].try_into().expect("4-byte slice"));
        let mut salt = [0u8; 32];
        salt.copy_from_slice(&region[12..]);
        Self::new(mem, n_iter, salt)
    }
}

/// One ROMix iteration: table fill, data-dependent mix, 32-byte output.
///
/// `mem` must be a positive multiple of 64 (validated by [`KdfParams`]).
/// The table is zeroized before release so no passphrase-dependent state
/// outlives the call.
fn key_one_iter(input: &[u8], salt: &[u8; 32], mem: u64) -> Zeroizing<[u8; 32]> {
    let mem = mem as usize;
    let n_blocks = mem / 64;
    let mut table = Zeroizing::new(vec![0u8; mem]);

    let mut hasher = Sha512::new();
    hasher.update(input);
    hasher.update(salt);
    table[..64].copy_from_slice(&hasher.finalize());

    for block in 1..n_blocks {
        let digest = Sha512::digest(&table[(block - 1) * 64..block * 64]);
        table[block * 64..(block + 1) * 64].copy_from_slice(&digest);
    }

    // x is the last table block, mixed in place. The lookup index comes from
    // the low 4 bytes of x, so each round's read depends on the previous
    // round's hash state.
    let x = mem - 64;
    for _ in 0..n_blocks / 2 {
        let idx = u32::from_le_bytes([
            table[x + 60],
            table[x + 61],
            table[x + 62],
            table[x + 63],
        ]);
        let v = (idx as usize % n_blocks) * 64;

        let mut block = [0u8; 64];
        block.copy_from_slice(&table[v..v + 64]);
        for (dst, src) in table[x..x + 64].iter_mut().zip(block.iter()) {
            *dst ^= src;
        }
        block.zeroize();

        let digest = Sha512::digest(&table[x..x + 64]);
        table[x..x + 64].copy_from_slice(&digest);
    }

    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(&table[x..x + 32]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> KdfParams {
        KdfParams::new(1024, 2, [7u8; 32]).unwrap()
    }

    // --- Derivation ---

    #[test]
    fn derive_deterministic() {
        let params = test_params();
        assert_eq!(params.derive_key(b"hunter2"), params.derive_key(b"hunter2"));
    }

    #[test]
    fn derive_passphrase_sensitive() {
        let params = test_params();
        assert_ne!(params.derive_key(b"hunter2"), params.derive_key(b"hunter3"));
    }

    #[test]
    fn derive_salt_sensitive() {
        let a = KdfParams::new(1024, 1, [1u8; 32]).unwrap();
        let b = KdfParams::new(1024, 1, [2u8; 32]).unwrap();
        assert_ne!(a.derive_key(b"pass"), b.derive_key(b"pass"));
    }

    #[test]
    fn derive_mem_sensitive() {
        let a = KdfParams::new(1024, 1, [1u8; 32]).unwrap();
        let b = KdfParams::new(2048, 1, [1u8; 32]).unwrap();
        assert_ne!(a.derive_key(b"pass"), b.derive_key(b"pass"));
    }

    #[test]
    fn derive_folds_single_iterations() {
        let salt = [9u8; 32];
        let two = KdfParams::new(1024, 2, salt).unwrap();
        let once = key_one_iter(b"pass", &salt, 1024);
        let twice = key_one_iter(&once[..], &salt, 1024);
        assert_eq!(&two.derive_key(b"pass")[..], &twice[..]);
    }

    #[test]
    fn single_iteration_matches_n_iter_one() {
        let salt = [3u8; 32];
        let params = KdfParams::new(1024, 1, salt).unwrap();
        assert_eq!(
            &params.derive_key(b"abc")[..],
            &key_one_iter(b"abc", &salt, 1024)[..]
        );
    }

    // --- Validation ---

    #[test]
    fn mem_must_be_multiple_of_64() {
        assert!(KdfParams::new(1000, 1, [0u8; 32]).is_err());
        assert!(KdfParams::new(0, 1, [0u8; 32]).is_err());
        assert!(KdfParams::new(64, 1, [0u8; 32]).is_ok());
    }

    #[test]
    fn n_iter_must_be_nonzero() {
        assert!(KdfParams::new(1024, 0, [0u8; 32]).is_err());
    }

    // --- Codec ---

    #[test]
    fn codec_roundtrip() {
        let params = KdfParams::new(4096, 3, [0xAB; 32]).unwrap();
        let mut buf = Vec::new();
        params.write_to(&mut Writer::new(&mut buf)).unwrap();
        assert_eq!(buf.len(), 8 + 4 + 44 + 4);

        let back = KdfParams::decode(&mut Reader::new(&buf[..])).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn checksummed_region_is_authoritative() {
        let params = KdfParams::new(4096, 3, [0xAB; 32]).unwrap();
        let mut buf = Vec::new();
        params.write_to(&mut Writer::new(&mut buf)).unwrap();

        // Corrupt the loose copies; the reader must take the region values.
        buf[..8].copy_from_slice(&999u64.to_le_bytes());
        buf[8..12].copy_from_slice(&77u32.to_le_bytes());

        let back = KdfParams::decode(&mut Reader::new(&buf[..])).unwrap();
        assert_eq!(back.mem(), 4096);
        assert_eq!(back.n_iter(), 3);
    }

    #[test]
    fn region_bit_flip_detected() {
        let params = KdfParams::new(4096, 3, [0xAB; 32]).unwrap();
        let mut buf = Vec::new();
        params.write_to(&mut Writer::new(&mut buf)).unwrap();
        buf[20] ^= 0x01; // inside the checksummed region's salt

        let err = KdfParams::decode(&mut Reader::new(&buf[..])).unwrap_err();
        assert_eq!(
            err,
            WalletError::ChecksumMismatch {
                field: "kdf parameters"
            }
        );
    }

    // --- Calibration ---

    #[test]
    fn calibration_shape() {
        // Zero target stops the memory search immediately; the iteration
        // search still runs against its fixed floor.
        let params = KdfParams::compute(0.0, MIN_KDF_MEM);
        assert_eq!(params.mem(), MIN_KDF_MEM);
        assert!(params.n_iter() >= 1);
        assert!(params.n_iter().is_power_of_two());
    }

    #[test]
    fn calibration_respects_mem_cap() {
        let params = KdfParams::compute(0.0, 2048);
        assert!(params.mem() <= 2048);
        assert_eq!(params.mem() % 64, 0);
    }
}
