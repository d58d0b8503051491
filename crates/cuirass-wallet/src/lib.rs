//! # cuirass-wallet — the on-disk wallet engine.
//!
//! Implements the legacy encrypted wallet container: a deterministic
//! secp256k1 key chain grown from a single root key and chaincode, a
//! memory-hard passphrase KDF, AES-256-CFB-encrypted key records, a
//! versioned binary container with a tagged entry stream, and the
//! lock/unlock state machine guarding plaintext key material.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`codec`] — counting little-endian reader/writer, checksummed fields
//! - [`version`] — container format version and its comparison quirk
//! - [`kdf`] — memory-hard KDF with wall-clock self-calibration
//! - [`cipher`] — AES-256-CFB private-key cipher
//! - [`chain`] — chained child-key derivation
//! - [`address`] — encrypted keypair records and their codec
//! - [`entry`] — the tagged entry stream
//! - [`recent`] — recent-blocks ring and iterator
//! - [`container`] — file header assembly and wallet (de)serialization
//! - [`wallet`] — the wallet aggregate

pub mod address;
pub mod chain;
pub mod cipher;
pub mod codec;
pub mod container;
pub mod entry;
pub mod error;
pub mod kdf;
pub mod recent;
pub mod version;
pub mod wallet;

// Re-exports for convenient access
pub use address::{AddrFlags, Address, IMPORTED_CHAIN_INDEX, ROOT_CHAIN_INDEX};
pub use container::{WalletFlags, FILE_ID, UNUSED_SPACE_LEN};
pub use error::WalletError;
pub use kdf::KdfParams;
pub use recent::{RecentBlocks, RecentBlocksIter, RECENT_BLOCKS_CAP};
pub use wallet::{AddressInfo, Wallet, DEFAULT_KEYPOOL_SIZE, MAX_DESC_LEN, MAX_NAME_LEN};
