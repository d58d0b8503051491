//! Wallet error types.

use cuirass_core::{AddressError, CryptoError, Network, NetworkError};
use thiserror::Error;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The requested address is not tracked by this wallet.
    #[error("address not found")]
    AddressNotFound,

    /// A checksummed field failed verification on read.
    #[error("checksum mismatch in {field}")]
    ChecksumMismatch {
        /// Name of the field whose checksum failed.
        field: &'static str,
    },

    /// An address with the same pubkey hash already exists.
    #[error("duplicate address")]
    DuplicateAddress,

    /// The wallet container is structurally invalid.
    #[error("malformed wallet data: {0}")]
    Malformed(String),

    /// An entry in the tagged stream is structurally invalid.
    #[error("malformed entry: {0}")]
    MalformedEntry(String),

    /// The file was written for a different network than expected.
    #[error("network mismatch: file is {file}, expected {expected}")]
    NetworkMismatch {
        /// Network recorded in the file.
        file: Network,
        /// Network the caller asked for.
        expected: Network,
    },

    /// No wallet file exists at the given path.
    #[error("wallet file does not exist")]
    WalletDoesNotExist,

    /// The operation needs the plaintext AES key but the wallet is locked.
    #[error("wallet is locked")]
    Locked,

    /// `lock` was called on a wallet that holds no key material.
    #[error("wallet is already locked")]
    AlreadyLocked,

    /// A key record was asked to encrypt twice.
    #[error("address is already encrypted")]
    AlreadyEncrypted,

    /// A key record that was never encrypted was asked to drop its
    /// plaintext.
    #[error("address is not encrypted")]
    NotEncrypted,

    /// The address record carries no public key.
    #[error("address has no public key")]
    MissingPubKey,

    /// The address record carries no private key.
    #[error("address has no private key")]
    MissingPrivKey,

    /// A comment exceeds the 65535-byte wire limit.
    #[error("comment exceeds {max} bytes")]
    CommentTooLong {
        /// Maximum comment length in bytes.
        max: usize,
    },

    /// The wallet name exceeds 32 bytes.
    #[error("wallet name exceeds {max} bytes")]
    NameTooLong {
        /// Maximum name length in bytes.
        max: usize,
    },

    /// The wallet description exceeds 256 bytes.
    #[error("wallet description exceeds {max} bytes")]
    DescriptionTooLong {
        /// Maximum description length in bytes.
        max: usize,
    },

    /// Cryptographic failure from cuirass-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Address encoding failure from cuirass-core.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Network lookup failure from cuirass-core.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// I/O error from the underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Io(err.to_string())
    }
}
