//! Container format version.
//!
//! Four components serialized as four bytes: major, minor, bugfix,
//! autoincrement. The comparison functions reproduce the lineage's exact
//! behavior: `lt` and `gt` scan components left to right and answer at the
//! first component that is strictly smaller (respectively greater), without
//! ordering on an earlier component that compares the other way. The scan
//! makes `1.0.0.0` compare less than `0.9.0.0`. Files in the wild depend on
//! this ordering, so it must not change without a declared format migration.

use std::fmt;

/// A four-component wallet file format version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatVersion {
    pub major: u8,
    pub minor: u8,
    pub bugfix: u8,
    pub auto: u8,
}

/// Version written by the current serializer.
pub const CURRENT: FormatVersion = FormatVersion::new(1, 36, 0, 0);

/// First version storing the multi-hash recent-blocks ring.
pub const RECENT_BLOCKS_RING: FormatVersion = FormatVersion::new(1, 36, 0, 0);

impl FormatVersion {
    /// Build a version from its four components.
    pub const fn new(major: u8, minor: u8, bugfix: u8, auto: u8) -> Self {
        Self {
            major,
            minor,
            bugfix,
            auto,
        }
    }

    /// The four components in wire order.
    pub fn to_bytes(self) -> [u8; 4] {
        [self.major, self.minor, self.bugfix, self.auto]
    }

    /// Parse a version from its wire bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    fn components(self) -> [u8; 4] {
        self.to_bytes()
    }

    /// Component scan: true at the first strictly-smaller component.
    pub fn lt(self, other: FormatVersion) -> bool {
        self.components()
            .iter()
            .zip(other.components())
            .any(|(a, b)| *a < b)
    }

    /// Component scan: true at the first strictly-greater component.
    pub fn gt(self, other: FormatVersion) -> bool {
        self.components()
            .iter()
            .zip(other.components())
            .any(|(a, b)| *a > b)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.bugfix, self.auto
        )
    }
}
