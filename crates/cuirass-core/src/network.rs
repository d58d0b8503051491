//! Chain identifier for the two supported networks.
//!
//! The wallet file records the network as the 4-byte peer-to-peer message
//! magic; printable addresses carry the network's P2PKH version byte.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::NetworkError;

/// Network identifier, exactly one of Bitcoin mainnet or testnet3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// Bitcoin mainnet.
    Mainnet,
    /// Bitcoin testnet3.
    Testnet3,
}

impl Network {
    /// The 4-byte peer-to-peer message magic identifying this network.
    pub fn magic(&self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0xF9, 0xBE, 0xB4, 0xD9],
            Network::Testnet3 => [0x0B, 0x11, 0x09, 0x07],
        }
    }

    /// Look up a network from its message magic.
    pub fn from_magic(magic: [u8; 4]) -> Result<Self, NetworkError> {
        match magic {
            [0xF9, 0xBE, 0xB4, 0xD9] => Ok(Network::Mainnet),
            [0x0B, 0x11, 0x09, 0x07] => Ok(Network::Testnet3),
            other => Err(NetworkError::UnknownMagic(other)),
        }
    }

    /// Version byte prefixed to a HASH160 in a Base58Check P2PKH address.
    pub fn p2pkh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet3 => 0x6F,
        }
    }

    /// Look up a network from a P2PKH address version byte.
    pub fn from_p2pkh_version(version: u8) -> Option<Self> {
        match version {
            0x00 => Some(Network::Mainnet),
            0x6F => Some(Network::Testnet3),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet3 => write!(f, "testnet3"),
        }
    }
}
