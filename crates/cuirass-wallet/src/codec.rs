//! Byte-level container I/O.
//!
//! All multi-byte integers in the wallet file are little-endian. [`Reader`]
//! and [`Writer`] track the number of bytes consumed or produced so a failed
//! parse can report exactly how far it got. Checksummed fields are a data
//! run followed by the 4-byte truncated double-SHA-256 of that run.

use std::io::{ErrorKind, Read, Write};

use cuirass_core::hash::field_checksum;

use crate::error::WalletError;
use crate::version::FormatVersion;

/// Counting little-endian reader over any [`Read`].
pub struct Reader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> Reader<R> {
    /// Wrap a reader, starting the byte counter at zero.
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    /// Bytes consumed so far, including any partial read before an error.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Fill `buf` completely or fail.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), WalletError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.pos += filled as u64;
                    return Err(WalletError::Malformed(format!(
                        "unexpected end of input at byte {}",
                        self.pos
                    )));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.pos += filled as u64;
                    return Err(e.into());
                }
            }
        }
        self.pos += filled as u64;
        Ok(())
    }

    /// Read one byte, or `None` on a clean end of stream.
    ///
    /// This is the entry-boundary probe: end of input before the first byte
    /// of an entry is normal termination, not an error.
    pub fn try_read_u8(&mut self) -> Result<Option<u8>, WalletError> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.pos += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], WalletError> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read `n` bytes into a vector.
    pub fn read_vec(&mut self, n: usize) -> Result<Vec<u8>, WalletError> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, WalletError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, WalletError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, WalletError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, WalletError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, WalletError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, WalletError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read an `N`-byte field plus its 4-byte checksum and verify them.
    pub fn read_checked<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u8; N], WalletError> {
        let data = self.read_array::<N>()?;
        let stored = self.read_u32()?;
        if field_checksum(&data) != stored {
            return Err(WalletError::ChecksumMismatch { field });
        }
        Ok(data)
    }

    /// Read a variable-length field plus its checksum and verify them.
    pub fn read_checked_vec(
        &mut self,
        n: usize,
        field: &'static str,
    ) -> Result<Vec<u8>, WalletError> {
        let data = self.read_vec(n)?;
        let stored = self.read_u32()?;
        if field_checksum(&data) != stored {
            return Err(WalletError::ChecksumMismatch { field });
        }
        Ok(data)
    }
}

/// Counting little-endian writer over any [`Write`].
pub struct Writer<W> {
    inner: W,
    pos: u64,
}

impl<W: Write> Writer<W> {
    /// Wrap a writer, starting the byte counter at zero.
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    /// Bytes produced so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Write all of `buf` or fail.
    pub fn write_all(&mut self, buf: &[u8]) -> Result<(), WalletError> {
        self.inner.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Write `n` zero padding bytes.
    pub fn write_zeros(&mut self, n: usize) -> Result<(), WalletError> {
        const CHUNK: [u8; 64] = [0u8; 64];
        let mut remaining = n;
        while remaining > 0 {
            let take = remaining.min(CHUNK.len());
            self.write_all(&CHUNK[..take])?;
            remaining -= take;
        }
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), WalletError> {
        self.write_all(&[v])
    }

    pub fn write_u16(&mut self, v: u16) -> Result<(), WalletError> {
        self.write_all(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), WalletError> {
        self.write_all(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<(), WalletError> {
        self.write_all(&v.to_le_bytes())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<(), WalletError> {
        self.write_all(&v.to_le_bytes())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<(), WalletError> {
        self.write_all(&v.to_le_bytes())
    }

    /// Write a field followed by its 4-byte checksum.
    pub fn write_checked(&mut self, data: &[u8]) -> Result<(), WalletError> {
        self.write_all(data)?;
        self.write_u32(field_checksum(data))
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), WalletError> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Decoding that may depend on the container format version.
///
/// Types whose wire layout never changed implement only [`decode`]; the
/// versioned entry point defaults to it. Types with a legacy layout override
/// [`decode_versioned`] and dispatch on the version they are handed.
///
/// [`decode`]: VersionedDecode::decode
/// [`decode_versioned`]: VersionedDecode::decode_versioned
pub trait VersionedDecode: Sized {
    /// Decode the current-format layout.
    fn decode<R: Read>(r: &mut Reader<R>) -> Result<Self, WalletError>;

    /// Decode the layout used by the given container version.
    fn decode_versioned<R: Read>(
        r: &mut Reader<R>,
        _version: FormatVersion,
    ) -> Result<Self, WalletError> {
        Self::decode(r)
    }
}
