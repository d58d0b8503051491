//! # cuirass-core
//! Foundation types for the Cuirass wallet engine: hash newtypes, digest
//! helpers, the network identifier, P2PKH address encoding, and secp256k1
//! keypair wrappers.

pub mod address;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod network;
pub mod types;

pub use address::P2pkhAddress;
pub use crypto::{PrivateKey, PublicKey};
pub use error::{AddressError, CryptoError, NetworkError};
pub use network::Network;
pub use types::{BlockStamp, Hash160, Hash256};
