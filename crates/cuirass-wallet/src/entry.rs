//! The tagged entry stream following the container header.
//!
//! Each entry starts with a 1-byte header code. End of input before a header
//! byte is normal stream termination; end of input anywhere inside an entry
//! is a malformed-entry error. Tombstones carry an opaque payload that must
//! still be consumed to keep the stream aligned.

use std::io::{Read, Write};

use cuirass_core::{Hash160, Hash256};

use crate::address::Address;
use crate::codec::{Reader, Writer};
use crate::error::WalletError;

/// Header code for a chained or imported key record.
pub const ENTRY_ADDRESS: u8 = 0x00;
/// Header code for an address comment.
pub const ENTRY_ADDR_COMMENT: u8 = 0x01;
/// Header code for a transaction comment.
pub const ENTRY_TX_COMMENT: u8 = 0x02;
/// Header code for a tombstone.
pub const ENTRY_DELETED: u8 = 0x04;

/// Largest comment the u16 length prefix can carry.
pub const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// One entry of the tagged stream.
#[derive(Debug, PartialEq, Eq)]
pub enum Entry {
    /// A key record, prefixed by a redundant copy of its pubkey hash.
    Address { hash: Hash160, record: Address },
    /// A comment attached to an address.
    AddrComment { hash: Hash160, comment: Vec<u8> },
    /// A comment attached to a transaction.
    TxComment { txid: Hash256, comment: Vec<u8> },
    /// A tombstone; its payload is discarded.
    Deleted { length: u16 },
}

/// Read the next entry, or `None` at a clean end of stream.
pub fn read_next<R: Read>(r: &mut Reader<R>) -> Result<Option<Entry>, WalletError> {
    let Some(code) = r.try_read_u8()? else {
        return Ok(None);
    };
    read_body(code, r).map(Some).map_err(as_entry_error)
}

/// Truncation inside an entry body surfaces as a malformed entry, not a
/// malformed container.
fn as_entry_error(err: WalletError) -> WalletError {
    match err {
        WalletError::Malformed(msg) => WalletError::MalformedEntry(msg),
        other => other,
    }
}

fn read_body<R: Read>(code: u8, r: &mut Reader<R>) -> Result<Entry, WalletError> {
    match code {
        ENTRY_ADDRESS => {
            let hash = Hash160(r.read_array::<20>()?);
            let record = Address::read_from(r)?;
            if record.pub_key_hash() != hash {
                return Err(WalletError::MalformedEntry(
                    "address entry hash does not match its key record".into(),
                ));
            }
            Ok(Entry::Address { hash, record })
        }
        ENTRY_ADDR_COMMENT => {
            let hash = Hash160(r.read_array::<20>()?);
            let length = r.read_u16()?;
            let comment = r.read_vec(length as usize)?;
            Ok(Entry::AddrComment { hash, comment })
        }
        ENTRY_TX_COMMENT => {
            // Wire order is hash, then length, then bytes.
            let txid = Hash256(r.read_array::<32>()?);
            let length = r.read_u16()?;
            let comment = r.read_vec(length as usize)?;
            Ok(Entry::TxComment { txid, comment })
        }
        ENTRY_DELETED => {
            let length = r.read_u16()?;
            let _discarded = r.read_vec(length as usize)?;
            Ok(Entry::Deleted { length })
        }
        other => Err(WalletError::MalformedEntry(format!(
            "unknown entry header {other:#04x} at byte {}",
            r.position()
        ))),
    }
}

impl Entry {
    /// Serialize the entry, header code included.
    pub fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<(), WalletError> {
        match self {
            Entry::Address { hash: _, record } => write_address_entry(w, record),
            Entry::AddrComment { hash, comment } => write_addr_comment_entry(w, hash, comment),
            Entry::TxComment { txid, comment } => write_tx_comment_entry(w, txid, comment),
            Entry::Deleted { length } => {
                w.write_u8(ENTRY_DELETED)?;
                w.write_u16(*length)?;
                w.write_zeros(*length as usize)
            }
        }
    }
}

/// Serialize a key record entry; the redundant hash prefix is taken from
/// the record itself.
pub(crate) fn write_address_entry<W: Write>(
    w: &mut Writer<W>,
    record: &Address,
) -> Result<(), WalletError> {
    w.write_u8(ENTRY_ADDRESS)?;
    w.write_all(record.pub_key_hash().as_bytes())?;
    record.write_to(w)
}

/// Serialize an address comment entry.
pub(crate) fn write_addr_comment_entry<W: Write>(
    w: &mut Writer<W>,
    hash: &Hash160,
    comment: &[u8],
) -> Result<(), WalletError> {
    check_comment_len(comment)?;
    w.write_u8(ENTRY_ADDR_COMMENT)?;
    w.write_all(hash.as_bytes())?;
    w.write_u16(comment.len() as u16)?;
    w.write_all(comment)
}

/// Serialize a transaction comment entry: hash, then length, then bytes.
pub(crate) fn write_tx_comment_entry<W: Write>(
    w: &mut Writer<W>,
    txid: &Hash256,
    comment: &[u8],
) -> Result<(), WalletError> {
    check_comment_len(comment)?;
    w.write_u8(ENTRY_TX_COMMENT)?;
    w.write_all(txid.as_bytes())?;
    w.write_u16(comment.len() as u16)?;
    w.write_all(comment)
}

pub(crate) fn check_comment_len(comment: &[u8]) -> Result<(), WalletError> {
    if comment.len() > MAX_COMMENT_LEN {
        return Err(WalletError::CommentTooLong {
            max: MAX_COMMENT_LEN,
        });
    }
    Ok(())
}
