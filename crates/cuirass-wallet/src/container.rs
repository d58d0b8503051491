//! The wallet file layout.
//!
//! A fixed-size header (file ID, format version, network magic, flags,
//! identity and naming fields, the KDF parameter region, a reserved crypto
//! region, the root key record, and the legacy unused-space region carrying
//! the recent-blocks payload) followed by the tagged entry stream until end
//! of input. All multi-byte integers are little-endian. There is no trailer;
//! end of input at an entry boundary is the normal terminator.

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::info;

use cuirass_core::{Hash160, Network};

use crate::address::{Address, IMPORTED_CHAIN_INDEX, ROOT_CHAIN_INDEX};
use crate::codec::{Reader, VersionedDecode, Writer};
use crate::entry::{self, Entry};
use crate::error::WalletError;
use crate::kdf::{KdfParams, KDF_REGION_LEN};
use crate::recent::RecentBlocks;
use crate::version::{self, FormatVersion};
use crate::wallet::{Wallet, MAX_DESC_LEN, MAX_NAME_LEN};

/// Magic bytes identifying a wallet file.
pub const FILE_ID: [u8; 8] = [0xBA, 0x57, 0x41, 0x4C, 0x4C, 0x45, 0x54, 0x00];

/// Width of the reserved crypto-parameters region.
pub const RESERVED_LEN: usize = 256;

/// Width of the legacy unused-space region holding the recent-blocks
/// payload.
pub const UNUSED_SPACE_LEN: usize = 1024;

/// Wallet-level flag bits, serialized in the low bits of an 8-byte field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalletFlags {
    pub use_encryption: bool,
    pub watching_only: bool,
}

impl WalletFlags {
    pub(crate) fn to_bits(self) -> u64 {
        let mut bits = 0u64;
        if self.use_encryption {
            bits |= 1 << 0;
        }
        if self.watching_only {
            bits |= 1 << 1;
        }
        bits
    }

    pub(crate) fn from_bits(bits: u64) -> Self {
        Self {
            use_encryption: bits & (1 << 0) != 0,
            watching_only: bits & (1 << 1) != 0,
        }
    }
}

/// Fixed-width region wrapping a shorter nested payload.
///
/// Reading consumes the whole region, decodes the nested versioned payload
/// from its front, and discards the zero padding; a payload that overruns
/// the region is a hard error. Writing pads the payload to the width.
struct PaddedRegion<const WIDTH: usize>;

impl<const WIDTH: usize> PaddedRegion<WIDTH> {
    fn read<R: Read, T: VersionedDecode>(
        r: &mut Reader<R>,
        file_version: FormatVersion,
    ) -> Result<T, WalletError> {
        let buf = r.read_vec(WIDTH)?;
        let mut nested = Reader::new(&buf[..]);
        T::decode_versioned(&mut nested, file_version)
    }

    fn write<W: Write>(w: &mut Writer<W>, payload: &[u8]) -> Result<(), WalletError> {
        if payload.len() > WIDTH {
            return Err(WalletError::Malformed(format!(
                "payload of {} bytes overruns its {WIDTH}-byte region",
                payload.len()
            )));
        }
        w.write_all(payload)?;
        w.write_zeros(WIDTH - payload.len())
    }
}

impl Wallet {
    /// Serialize the wallet. Returns the number of bytes written.
    ///
    /// Always emits the current format version. A failed write leaves the
    /// sink in an indeterminate state; callers must treat it as aborted.
    pub fn write_to<W: Write>(&self, sink: W) -> Result<u64, WalletError> {
        let mut w = Writer::new(sink);

        w.write_all(&FILE_ID)?;
        w.write_all(&version::CURRENT.to_bytes())?;
        w.write_all(&self.net.magic())?;
        w.write_u64(self.flags.to_bits())?;
        w.write_all(&self.unique_id)?;
        w.write_i64(self.create_date)?;
        write_padded(&mut w, self.name.as_bytes(), MAX_NAME_LEN)?;
        write_padded(&mut w, self.desc.as_bytes(), MAX_DESC_LEN)?;
        w.write_i64(self.highest_used)?;

        let mut kdf_buf = Vec::with_capacity(KDF_REGION_LEN);
        self.kdf_params.write_to(&mut Writer::new(&mut kdf_buf))?;
        PaddedRegion::<KDF_REGION_LEN>::write(&mut w, &kdf_buf)?;

        w.write_zeros(RESERVED_LEN)?;

        self.key_generator().write_to(&mut w)?;

        let mut recent_buf = Vec::new();
        self.recent.write_to(&mut Writer::new(&mut recent_buf))?;
        PaddedRegion::<UNUSED_SPACE_LEN>::write(&mut w, &recent_buf)?;

        // Chained records in index order, then imported records in
        // insertion order, then comments in sorted-key order.
        for index in 0..=self.last_chain_idx {
            let record = self.record_at(index)?;
            entry::write_address_entry(&mut w, record)?;
        }
        for hash in &self.imported {
            let record = self
                .addr_map
                .get(hash)
                .ok_or_else(|| WalletError::Malformed("imported record missing".into()))?;
            entry::write_address_entry(&mut w, record)?;
        }

        let mut addr_comment_keys: Vec<&Hash160> = self.addr_comments.keys().collect();
        addr_comment_keys.sort();
        for hash in addr_comment_keys {
            entry::write_addr_comment_entry(&mut w, hash, &self.addr_comments[hash])?;
        }

        let mut tx_comment_keys: Vec<_> = self.tx_comments.keys().collect();
        tx_comment_keys.sort();
        for txid in tx_comment_keys {
            entry::write_tx_comment_entry(&mut w, txid, &self.tx_comments[txid])?;
        }

        w.flush()?;
        Ok(w.position())
    }

    /// Parse a wallet written for the given network.
    ///
    /// The parsed wallet is locked; callers unlock it with the passphrase.
    pub fn read_from<R: Read>(source: R, net: Network) -> Result<Self, WalletError> {
        let mut r = Reader::new(source);

        let file_id = r.read_array::<8>()?;
        if file_id != FILE_ID {
            return Err(WalletError::Malformed("unrecognized file id".into()));
        }
        let file_version = FormatVersion::from_bytes(r.read_array::<4>()?);
        let file_net = Network::from_magic(r.read_array::<4>()?)?;
        if file_net != net {
            return Err(WalletError::NetworkMismatch {
                file: file_net,
                expected: net,
            });
        }

        let flags = WalletFlags::from_bits(r.read_u64()?);
        if !flags.use_encryption {
            return Err(WalletError::Malformed(
                "unencrypted wallets are not supported".into(),
            ));
        }
        if flags.watching_only {
            return Err(WalletError::Malformed(
                "watching-only wallets are not supported".into(),
            ));
        }

        let unique_id = r.read_array::<6>()?;
        let create_date = r.read_i64()?;
        let name = trim_padded(&r.read_vec(MAX_NAME_LEN)?);
        let desc = trim_padded(&r.read_vec(MAX_DESC_LEN)?);
        let highest_used = r.read_i64()?;

        let kdf_params: KdfParams = PaddedRegion::<KDF_REGION_LEN>::read(&mut r, file_version)?;
        let _reserved = r.read_vec(RESERVED_LEN)?;

        let key_generator = Address::read_from(&mut r)?;
        if key_generator.chain_index() != ROOT_CHAIN_INDEX {
            return Err(WalletError::Malformed(format!(
                "key generator has chain index {}",
                key_generator.chain_index()
            )));
        }

        let recent: RecentBlocks = PaddedRegion::<UNUSED_SPACE_LEN>::read(&mut r, file_version)?;

        let mut wallet = Self {
            net,
            flags,
            unique_id,
            create_date,
            name,
            desc,
            highest_used,
            kdf_params,
            recent,
            addr_map: Default::default(),
            addr_comments: Default::default(),
            tx_comments: Default::default(),
            chain_idx: Default::default(),
            imported: Vec::new(),
            last_chain_idx: ROOT_CHAIN_INDEX,
            secret: Mutex::new(None),
        };
        wallet
            .chain_idx
            .insert(ROOT_CHAIN_INDEX, key_generator.pub_key_hash());
        wallet
            .addr_map
            .insert(key_generator.pub_key_hash(), key_generator);

        while let Some(parsed) = entry::read_next(&mut r)? {
            match parsed {
                Entry::Address { hash, record } => {
                    match record.chain_index() {
                        index if index >= 0 => {
                            wallet.chain_idx.insert(index, hash);
                            wallet.last_chain_idx = wallet.last_chain_idx.max(index);
                        }
                        IMPORTED_CHAIN_INDEX => wallet.imported.push(hash),
                        other => {
                            return Err(WalletError::MalformedEntry(format!(
                                "address entry with chain index {other}"
                            )));
                        }
                    }
                    wallet.addr_map.insert(hash, record);
                }
                Entry::AddrComment { hash, comment } => {
                    wallet.addr_comments.insert(hash, comment);
                }
                Entry::TxComment { txid, comment } => {
                    wallet.tx_comments.insert(txid, comment);
                }
                Entry::Deleted { .. } => {}
            }
        }

        for index in 0..=wallet.last_chain_idx {
            if !wallet.chain_idx.contains_key(&index) {
                return Err(WalletError::Malformed(format!(
                    "chain index {index} missing from file"
                )));
            }
        }
        if wallet.highest_used < ROOT_CHAIN_INDEX || wallet.highest_used > wallet.last_chain_idx {
            return Err(WalletError::Malformed(format!(
                "highest used index {} outside [-1, {}]",
                wallet.highest_used, wallet.last_chain_idx
            )));
        }

        info!(
            net = %wallet.net,
            addresses = wallet.addr_map.len(),
            bytes = r.position(),
            "loaded wallet"
        );
        Ok(wallet)
    }

    /// Serialize to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), WalletError> {
        let mut data = Vec::new();
        self.write_to(&mut data)?;
        fs::write(path, &data)?;
        Ok(())
    }

    /// Load from a file written for the given network.
    pub fn load_from_file(path: &Path, net: Network) -> Result<Self, WalletError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WalletError::WalletDoesNotExist);
            }
            Err(e) => return Err(e.into()),
        };
        Self::read_from(&data[..], net)
    }

    fn record_at(&self, index: i64) -> Result<&Address, WalletError> {
        self.chain_idx
            .get(&index)
            .and_then(|hash| self.addr_map.get(hash))
            .ok_or_else(|| WalletError::Malformed(format!("chain index {index} missing")))
    }
}

fn write_padded<W: Write>(
    w: &mut Writer<W>,
    bytes: &[u8],
    width: usize,
) -> Result<(), WalletError> {
    // Lengths are validated at wallet construction.
    w.write_all(bytes)?;
    w.write_zeros(width - bytes.len())
}

/// Printable form of a NUL-padded byte field: everything before the first
/// NUL, interpreted lossily as UTF-8.
fn trim_padded(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
