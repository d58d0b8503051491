//! Ring of recently seen block hashes.
//!
//! Holds up to 20 hashes, oldest first; the hash at the top of the ring
//! belongs to the last synced height and earlier slots count down from it.
//! Rollbacks that land on a hash already in the ring truncate it; anything
//! else (gaps, unknown rollbacks) clears the ring and starts over from the
//! new stamp.

use std::io::{Read, Write};

use cuirass_core::{BlockStamp, Hash256};

use crate::codec::{Reader, VersionedDecode, Writer};
use crate::error::WalletError;
use crate::version::{self, FormatVersion};

/// Maximum number of hashes the ring retains.
pub const RECENT_BLOCKS_CAP: usize = 20;

/// Bounded FIFO of block hashes with the height of the newest entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecentBlocks {
    last_height: i32,
    /// Oldest first; at most [`RECENT_BLOCKS_CAP`] entries.
    hashes: Vec<Hash256>,
}

impl RecentBlocks {
    /// An empty ring: height −1, no hashes.
    pub fn new() -> Self {
        Self {
            last_height: -1,
            hashes: Vec::new(),
        }
    }

    /// Number of hashes currently held.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Record a newly synced block stamp.
    ///
    /// A rollback to a stamp whose hash matches the ring slot for that
    /// height drops that slot and everything after it; the stored height
    /// follows the hash that survives at the top, keeping the height/hash
    /// pairing intact. A rollback to an unknown hash, or any non-contiguous
    /// height, clears the ring. The stamp's hash is then appended, evicting
    /// the oldest entry once the ring is full.
    pub fn sync_to(&mut self, bs: &BlockStamp) {
        if bs.height < self.last_height {
            let back = (self.last_height as i64 - bs.height as i64) as usize;
            if self.hashes.len() > back {
                let offset = self.hashes.len() - 1 - back;
                if self.hashes[offset] == bs.hash {
                    self.hashes.truncate(offset);
                    // The surviving top entry is the block below the
                    // rollback target; an emptied ring is unsynced.
                    self.last_height = if self.hashes.is_empty() {
                        -1
                    } else {
                        bs.height - 1
                    };
                    return;
                }
            }
            self.hashes.clear();
        } else if bs.height != self.last_height + 1 {
            self.hashes.clear();
        }

        self.last_height = bs.height;
        if self.hashes.len() == RECENT_BLOCKS_CAP {
            self.hashes.remove(0);
        }
        self.hashes.push(bs.hash);
    }

    /// The newest synced stamp, or the unsynced stamp when the ring is
    /// empty.
    pub fn synced_with(&self) -> BlockStamp {
        match self.hashes.last() {
            None => BlockStamp::default(),
            Some(hash) => BlockStamp::new(self.last_height, *hash),
        }
    }

    /// Start a bidirectional walk at the newest entry. `None` when empty.
    pub fn iter(&self) -> Option<RecentBlocksIter<'_>> {
        if self.hashes.is_empty() {
            None
        } else {
            Some(RecentBlocksIter {
                recent: self,
                index: self.hashes.len() - 1,
            })
        }
    }

    /// Serialize in the current ring layout.
    pub fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<(), WalletError> {
        w.write_u32(self.hashes.len() as u32)?;
        if !self.hashes.is_empty() {
            w.write_i32(self.last_height)?;
            for hash in &self.hashes {
                w.write_all(hash.as_bytes())?;
            }
        }
        Ok(())
    }
}

impl Default for RecentBlocks {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionedDecode for RecentBlocks {
    fn decode<R: Read>(r: &mut Reader<R>) -> Result<Self, WalletError> {
        let count = r.read_u32()? as usize;
        if count > RECENT_BLOCKS_CAP {
            return Err(WalletError::Malformed(format!(
                "recent block count {count} exceeds {RECENT_BLOCKS_CAP}"
            )));
        }
        if count == 0 {
            return Ok(Self::new());
        }
        let last_height = r.read_i32()?;
        let mut hashes = Vec::with_capacity(count);
        for _ in 0..count {
            hashes.push(Hash256(r.read_array::<32>()?));
        }
        Ok(Self { last_height, hashes })
    }

    fn decode_versioned<R: Read>(
        r: &mut Reader<R>,
        file_version: FormatVersion,
    ) -> Result<Self, WalletError> {
        if file_version.lt(version::RECENT_BLOCKS_RING) {
            // Legacy layout: a single stamp, no count prefix.
            let last_height = r.read_i32()?;
            let hash = Hash256(r.read_array::<32>()?);
            if last_height == -1 {
                return Ok(Self::new());
            }
            return Ok(Self {
                last_height,
                hashes: vec![hash],
            });
        }
        Self::decode(r)
    }
}

/// Bidirectional cursor over a [`RecentBlocks`] ring.
pub struct RecentBlocksIter<'a> {
    recent: &'a RecentBlocks,
    index: usize,
}

impl RecentBlocksIter<'_> {
    /// Step toward older entries. False when already at the oldest.
    pub fn prev(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Step toward newer entries. False when already at the newest.
    pub fn next(&mut self) -> bool {
        if self.index + 1 >= self.recent.hashes.len() {
            return false;
        }
        self.index += 1;
        true
    }

    /// The stamp at the cursor.
    pub fn block_stamp(&self) -> BlockStamp {
        let back = self.recent.hashes.len() - 1 - self.index;
        BlockStamp::new(
            self.recent.last_height - back as i32,
            self.recent.hashes[self.index],
        )
    }
}
