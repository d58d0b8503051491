//! Encrypted keypair records.
//!
//! An [`Address`] is one keypair tracked by the wallet: the HASH160 of its
//! public key, the chaincode and chain index placing it in the deterministic
//! chain, the AES-CFB ciphertext of its private-key scalar with a per-record
//! IV, and first/last seen bookkeeping. The plaintext scalar lives only in a
//! mutex-guarded cache between unlock and lock and is zeroized when dropped.
//!
//! The on-disk codec is byte-exact for the legacy container: checksummed
//! hash, chaincode, IV, ciphertext, and public key runs, little-endian
//! integers throughout, and a SEC1 format byte selecting the 33- or 65-byte
//! public key encoding.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::io::{Read, Write};
use zeroize::Zeroizing;

use cuirass_core::hash::field_checksum;
use cuirass_core::{BlockStamp, CryptoError, Hash160, Network, P2pkhAddress, PrivateKey, PublicKey};

use crate::cipher;
use crate::codec::{Reader, Writer};
use crate::error::WalletError;
use crate::version;

/// Chain index of the root key record.
pub const ROOT_CHAIN_INDEX: i64 = -1;

/// Chain index marking an imported (non-chained) key record.
pub const IMPORTED_CHAIN_INDEX: i64 = -2;

/// Per-record flag bits, serialized in the low bits of an 8-byte field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AddrFlags {
    pub has_priv_key: bool,
    pub has_pub_key: bool,
    pub encrypted: bool,
    pub create_priv_next_unlock: bool,
    pub compressed: bool,
}

impl AddrFlags {
    fn to_bits(self) -> u64 {
        let mut bits = 0u64;
        if self.has_priv_key {
            bits |= 1 << 0;
        }
        if self.has_pub_key {
            bits |= 1 << 1;
        }
        if self.encrypted {
            bits |= 1 << 2;
        }
        if self.create_priv_next_unlock {
            bits |= 1 << 3;
        }
        if self.compressed {
            bits |= 1 << 4;
        }
        bits
    }

    fn from_bits(bits: u64) -> Self {
        Self {
            has_priv_key: bits & (1 << 0) != 0,
            has_pub_key: bits & (1 << 1) != 0,
            encrypted: bits & (1 << 2) != 0,
            create_priv_next_unlock: bits & (1 << 3) != 0,
            compressed: bits & (1 << 4) != 0,
        }
    }
}

/// An encrypted keypair record.
pub struct Address {
    pub_key_hash: Hash160,
    flags: AddrFlags,
    chaincode: [u8; 32],
    chain_index: i64,
    chain_depth: i64,
    init_vector: [u8; 16],
    priv_key_ct: [u8; 32],
    pub_key: PublicKey,
    first_seen: i64,
    last_seen: i64,
    first_block: i32,
    last_block: i32,
    /// Plaintext scalar cache, populated between unlock and lock.
    plain: Mutex<Option<Zeroizing<[u8; 32]>>>,
}

impl Address {
    /// Build a fresh record for a private key.
    ///
    /// A missing IV is drawn from the OS RNG. The record starts unencrypted
    /// with the plaintext held in its cache; call [`encrypt`](Self::encrypt)
    /// before persisting it.
    pub fn new(
        key: &PrivateKey,
        iv: Option<[u8; 16]>,
        bs: &BlockStamp,
        compressed: bool,
        chaincode: [u8; 32],
        chain_index: i64,
    ) -> Self {
        let init_vector = iv.unwrap_or_else(random_iv);
        let pub_key = key.public_key();
        let pub_key_hash = pub_key.hash160(compressed);
        let now = Utc::now().timestamp();
        Self {
            pub_key_hash,
            flags: AddrFlags {
                has_priv_key: true,
                has_pub_key: true,
                encrypted: false,
                create_priv_next_unlock: false,
                compressed,
            },
            chaincode,
            chain_index,
            chain_depth: 0,
            init_vector,
            priv_key_ct: [0u8; 32],
            pub_key,
            first_seen: now,
            last_seen: now,
            first_block: bs.height,
            last_block: bs.height,
            plain: Mutex::new(Some(Zeroizing::new(*key.to_bytes()))),
        }
    }

    pub fn pub_key_hash(&self) -> Hash160 {
        self.pub_key_hash
    }

    pub fn flags(&self) -> AddrFlags {
        self.flags
    }

    pub fn chaincode(&self) -> &[u8; 32] {
        &self.chaincode
    }

    pub fn chain_index(&self) -> i64 {
        self.chain_index
    }

    pub fn init_vector(&self) -> &[u8; 16] {
        &self.init_vector
    }

    /// The stored AES-CFB ciphertext of the private-key scalar.
    pub fn ciphertext(&self) -> &[u8; 32] {
        &self.priv_key_ct
    }

    pub fn pub_key(&self) -> &PublicKey {
        &self.pub_key
    }

    pub fn first_seen(&self) -> i64 {
        self.first_seen
    }

    pub fn last_seen(&self) -> i64 {
        self.last_seen
    }

    pub fn first_block(&self) -> i32 {
        self.first_block
    }

    pub fn last_block(&self) -> i32 {
        self.last_block
    }

    pub(crate) fn set_first_block(&mut self, height: i32) {
        self.first_block = height;
    }

    /// The SEC1 encoding the record persists (matches the compressed flag).
    pub fn pub_key_bytes(&self) -> Vec<u8> {
        self.pub_key.serialize(self.flags.compressed)
    }

    /// The printable P2PKH form on the given network.
    pub fn address(&self, network: Network) -> P2pkhAddress {
        P2pkhAddress::from_pubkey_hash(self.pub_key_hash, network)
    }

    /// Encrypt the cached plaintext under the wallet AES key.
    ///
    /// Fails on a record that is already encrypted; re-encryption is not
    /// supported. The plaintext stays cached so the record remains usable
    /// until the wallet locks.
    pub fn encrypt(&mut self, aes_key: &[u8; 32]) -> Result<(), WalletError> {
        if self.flags.encrypted {
            return Err(WalletError::AlreadyEncrypted);
        }
        let ciphertext = {
            let guard = self.plain.lock();
            let plain = guard.as_ref().ok_or(WalletError::MissingPrivKey)?;
            cipher::encrypt_key(aes_key, &self.init_vector, plain)
        };
        self.priv_key_ct = ciphertext;
        self.flags.encrypted = true;
        Ok(())
    }

    /// Return a caller-owned copy of the plaintext private-key scalar.
    ///
    /// The cached plaintext is returned directly when present. Otherwise the
    /// ciphertext is decrypted and the public key recomputed from the
    /// result; a mismatch against the stored public key (the wrong-passphrase
    /// signal) fails with [`CryptoError::PubkeyMismatch`]. On success the
    /// plaintext is cached for subsequent calls.
    pub fn unlock(&self, aes_key: &[u8; 32]) -> Result<Zeroizing<[u8; 32]>, WalletError> {
        let mut guard = self.plain.lock();
        if let Some(plain) = guard.as_ref() {
            return Ok(Zeroizing::new(**plain));
        }

        let plain = cipher::decrypt_key(aes_key, &self.init_vector, &self.priv_key_ct);
        let key = PrivateKey::from_bytes(&plain).map_err(|_| CryptoError::PubkeyMismatch)?;
        if key.public_key() != self.pub_key {
            return Err(CryptoError::PubkeyMismatch.into());
        }

        let copy = Zeroizing::new(*plain);
        *guard = Some(plain);
        Ok(copy)
    }

    /// Zeroize and drop the cached plaintext.
    ///
    /// Requires an encrypted record; an unencrypted record would lose its
    /// only copy of the key.
    pub fn lock(&self) -> Result<(), WalletError> {
        if !self.flags.encrypted {
            return Err(WalletError::NotEncrypted);
        }
        *self.plain.lock() = None;
        Ok(())
    }

    /// Whether a plaintext scalar is currently cached.
    pub fn is_unlocked(&self) -> bool {
        self.plain.lock().is_some()
    }

    /// Serialize the record.
    pub fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<(), WalletError> {
        w.write_checked(self.pub_key_hash.as_bytes())?;
        // Reserved version slot; readers ignore it.
        w.write_all(&version::CURRENT.to_bytes())?;
        w.write_u64(self.flags.to_bits())?;
        w.write_checked(&self.chaincode)?;
        w.write_i64(self.chain_index)?;
        w.write_i64(self.chain_depth)?;
        w.write_checked(&self.init_vector)?;
        w.write_checked(&self.priv_key_ct)?;
        w.write_checked(&self.pub_key_bytes())?;
        w.write_i64(self.first_seen)?;
        w.write_i64(self.last_seen)?;
        w.write_i32(self.first_block)?;
        w.write_i32(self.last_block)?;
        Ok(())
    }

    /// Parse a record, verifying every field checksum.
    ///
    /// Only encrypted records are accepted: a record declaring a plaintext
    /// private key is malformed in this container.
    pub fn read_from<R: Read>(r: &mut Reader<R>) -> Result<Self, WalletError> {
        let pub_key_hash = Hash160(r.read_checked::<20>("pubkey hash")?);
        let _reserved_version = r.read_array::<4>()?;
        let flags = AddrFlags::from_bits(r.read_u64()?);
        if !flags.encrypted {
            return Err(WalletError::Malformed("key record is not encrypted".into()));
        }

        let chaincode = r.read_checked::<32>("chaincode")?;
        let chain_index = r.read_i64()?;
        let chain_depth = r.read_i64()?;
        let init_vector = r.read_checked::<16>("init vector")?;
        let priv_key_ct = r.read_checked::<32>("private key")?;

        let format = r.read_u8()?;
        let body_len = match format {
            0x02 | 0x03 => 32,
            0x04 => 64,
            other => {
                return Err(WalletError::Malformed(format!(
                    "unrecognized pubkey format byte {other:#04x}"
                )));
            }
        };
        if flags.compressed != (format != 0x04) {
            return Err(WalletError::Malformed(
                "pubkey format byte disagrees with compressed flag".into(),
            ));
        }
        let mut encoded = vec![format];
        encoded.extend_from_slice(&r.read_vec(body_len)?);
        let stored = r.read_u32()?;
        if field_checksum(&encoded) != stored {
            return Err(WalletError::ChecksumMismatch { field: "pubkey" });
        }
        let pub_key = PublicKey::from_sec1(&encoded)?;

        let first_seen = r.read_i64()?;
        let last_seen = r.read_i64()?;
        let first_block = r.read_i32()?;
        let last_block = r.read_i32()?;

        Ok(Self {
            pub_key_hash,
            flags,
            chaincode,
            chain_index,
            chain_depth,
            init_vector,
            priv_key_ct,
            pub_key,
            first_seen,
            last_seen,
            first_block,
            last_block,
            plain: Mutex::new(None),
        })
    }
}

impl PartialEq for Address {
    /// Compares the persisted fields; the plaintext cache does not take part.
    fn eq(&self, other: &Self) -> bool {
        self.pub_key_hash == other.pub_key_hash
            && self.flags == other.flags
            && self.chaincode == other.chaincode
            && self.chain_index == other.chain_index
            && self.chain_depth == other.chain_depth
            && self.init_vector == other.init_vector
            && self.priv_key_ct == other.priv_key_ct
            && self.pub_key == other.pub_key
            && self.first_seen == other.first_seen
            && self.last_seen == other.last_seen
            && self.first_block == other.first_block
            && self.last_block == other.last_block
    }
}

impl Eq for Address {}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address")
            .field("pub_key_hash", &self.pub_key_hash.to_string())
            .field("chain_index", &self.chain_index)
            .field("encrypted", &self.flags.encrypted)
            .field("unlocked", &self.is_unlocked())
            .finish_non_exhaustive()
    }
}

fn random_iv() -> [u8; 16] {
    let mut iv = [0u8; 16];
    OsRng.fill_bytes(&mut iv);
    iv
}

#[cfg(test)]
mod tests {
    use super::*;

    const AES_KEY: [u8; 32] = [0x55; 32];

    fn stamp() -> BlockStamp {
        BlockStamp::new(100, cuirass_core::Hash256([0xAA; 32]))
    }

    fn encrypted_record(compressed: bool) -> Address {
        let key = PrivateKey::random();
        let mut record = Address::new(&key, None, &stamp(), compressed, [0x42; 32], 3);
        record.encrypt(&AES_KEY).unwrap();
        record
    }

    // --- Flags ---

    #[test]
    fn flags_bits_roundtrip() {
        let flags = AddrFlags {
            has_priv_key: true,
            has_pub_key: true,
            encrypted: true,
            create_priv_next_unlock: false,
            compressed: true,
        };
        assert_eq!(flags.to_bits(), 0b10111);
        assert_eq!(AddrFlags::from_bits(flags.to_bits()), flags);
    }

    #[test]
    fn flags_high_bits_ignored() {
        let flags = AddrFlags::from_bits(0xFFFF_FFFF_FFFF_FF00);
        assert_eq!(flags, AddrFlags::default());
    }

    // --- Construction ---

    #[test]
    fn new_record_state() {
        let key = PrivateKey::random();
        let record = Address::new(&key, Some([9u8; 16]), &stamp(), true, [1u8; 32], -1);
        assert_eq!(record.chain_index(), -1);
        assert_eq!(record.first_block(), 100);
        assert_eq!(record.last_block(), 100);
        assert_eq!(record.init_vector(), &[9u8; 16]);
        assert!(!record.flags().encrypted);
        assert!(record.is_unlocked());
        assert_eq!(record.pub_key_hash(), key.public_key().hash160(true));
    }

    #[test]
    fn random_iv_when_absent() {
        let key = PrivateKey::random();
        let a = Address::new(&key, None, &stamp(), true, [1u8; 32], 0);
        let b = Address::new(&key, None, &stamp(), true, [1u8; 32], 0);
        assert_ne!(a.init_vector(), b.init_vector());
    }

    // --- Encrypt / unlock / lock ---

    #[test]
    fn encrypt_then_unlock_roundtrip() {
        let key = PrivateKey::random();
        let mut record = Address::new(&key, None, &stamp(), true, [0u8; 32], 0);
        record.encrypt(&AES_KEY).unwrap();
        assert!(record.flags().encrypted);

        record.lock().unwrap();
        let plain = record.unlock(&AES_KEY).unwrap();
        assert_eq!(*plain, *key.to_bytes());
    }

    #[test]
    fn encryption_bijection() {
        let record = encrypted_record(true);
        record.lock().unwrap();
        let plain = record.unlock(&AES_KEY).unwrap();
        let reencrypted = cipher::encrypt_key(&AES_KEY, record.init_vector(), &plain);
        assert_eq!(&reencrypted, record.ciphertext());
    }

    #[test]
    fn double_encrypt_fails() {
        let mut record = encrypted_record(true);
        assert_eq!(record.encrypt(&AES_KEY).unwrap_err(), WalletError::AlreadyEncrypted);
    }

    #[test]
    fn unlock_wrong_key_fails() {
        let record = encrypted_record(true);
        record.lock().unwrap();
        let err = record.unlock(&[0xFE; 32]).unwrap_err();
        assert_eq!(err, WalletError::Crypto(CryptoError::PubkeyMismatch));
        assert!(!record.is_unlocked());
    }

    #[test]
    fn unlock_cached_fast_path_ignores_key() {
        // While the plaintext is cached the key argument is not consulted.
        let record = encrypted_record(true);
        assert!(record.is_unlocked());
        let plain = record.unlock(&[0u8; 32]).unwrap();
        assert_eq!(*plain, *record.unlock(&AES_KEY).unwrap());
    }

    #[test]
    fn lock_clears_cache() {
        let record = encrypted_record(true);
        assert!(record.is_unlocked());
        record.lock().unwrap();
        assert!(!record.is_unlocked());
        // Locking an already-locked record is still fine.
        record.lock().unwrap();
    }

    #[test]
    fn lock_unencrypted_fails() {
        let key = PrivateKey::random();
        let record = Address::new(&key, None, &stamp(), true, [0u8; 32], 0);
        assert_eq!(record.lock().unwrap_err(), WalletError::NotEncrypted);
    }

    // --- Codec ---

    #[test]
    fn codec_roundtrip_compressed() {
        let record = encrypted_record(true);
        let mut buf = Vec::new();
        record.write_to(&mut Writer::new(&mut buf)).unwrap();
        assert_eq!(buf.len(), 205);

        let back = Address::read_from(&mut Reader::new(&buf[..])).unwrap();
        assert_eq!(back, record);
        assert!(!back.is_unlocked());
    }

    #[test]
    fn codec_roundtrip_uncompressed() {
        let record = encrypted_record(false);
        let mut buf = Vec::new();
        record.write_to(&mut Writer::new(&mut buf)).unwrap();
        assert_eq!(buf.len(), 237);

        let back = Address::read_from(&mut Reader::new(&buf[..])).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn parsed_record_unlocks() {
        let record = encrypted_record(true);
        let mut buf = Vec::new();
        record.write_to(&mut Writer::new(&mut buf)).unwrap();

        let back = Address::read_from(&mut Reader::new(&buf[..])).unwrap();
        let plain = back.unlock(&AES_KEY).unwrap();
        let original = record.unlock(&AES_KEY).unwrap();
        assert_eq!(*plain, *original);
    }

    #[test]
    fn checksum_flips_detected_per_field() {
        // Offsets of one data byte inside each checksummed run of the
        // compressed layout.
        let cases: &[(usize, &str)] = &[
            (0, "pubkey hash"),
            (36, "chaincode"),
            (88, "init vector"),
            (108, "private key"),
            (150, "pubkey"),
        ];
        for &(offset, field) in cases {
            let record = encrypted_record(true);
            let mut buf = Vec::new();
            record.write_to(&mut Writer::new(&mut buf)).unwrap();
            buf[offset] ^= 0x01;

            let err = Address::read_from(&mut Reader::new(&buf[..])).unwrap_err();
            assert_eq!(
                err,
                WalletError::ChecksumMismatch { field },
                "flip at offset {offset}"
            );
        }
    }

    #[test]
    fn unencrypted_record_rejected() {
        let record = encrypted_record(true);
        let mut buf = Vec::new();
        record.write_to(&mut Writer::new(&mut buf)).unwrap();
        // Clear the encrypted bit (flags start at offset 28).
        buf[28] &= !(1 << 2);

        let err = Address::read_from(&mut Reader::new(&buf[..])).unwrap_err();
        assert!(matches!(err, WalletError::Malformed(_)));
    }

    #[test]
    fn unknown_pubkey_format_rejected() {
        let record = encrypted_record(true);
        let mut buf = Vec::new();
        record.write_to(&mut Writer::new(&mut buf)).unwrap();
        buf[144] = 0x07;

        let err = Address::read_from(&mut Reader::new(&buf[..])).unwrap_err();
        assert!(matches!(err, WalletError::Malformed(_)));
    }

    #[test]
    fn truncated_record_fails() {
        let record = encrypted_record(true);
        let mut buf = Vec::new();
        record.write_to(&mut Writer::new(&mut buf)).unwrap();
        buf.truncate(120);

        let err = Address::read_from(&mut Reader::new(&buf[..])).unwrap_err();
        assert!(matches!(err, WalletError::Malformed(_)));
    }

    // --- Misc ---

    #[test]
    fn printable_address_by_network() {
        let record = encrypted_record(true);
        let mainnet = record.address(Network::Mainnet);
        let testnet = record.address(Network::Testnet3);
        assert_eq!(mainnet.pubkey_hash(), record.pub_key_hash());
        assert_ne!(mainnet.encode(), testnet.encode());
    }

    #[test]
    fn debug_redacts_key_material() {
        let record = encrypted_record(true);
        let debug = format!("{record:?}");
        assert!(debug.contains("Address"));
        assert!(!debug.contains(&hex::encode(record.ciphertext())));
    }
}
