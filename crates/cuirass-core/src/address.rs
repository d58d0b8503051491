//! P2PKH address encoding.
//!
//! A printable address is Base58Check over the network's P2PKH version byte
//! followed by the 20-byte HASH160 of the public key. Only pay-to-pubkey-hash
//! addresses are supported.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;
use crate::network::Network;
use crate::types::Hash160;

/// A pay-to-pubkey-hash address: a network plus a 20-byte pubkey hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct P2pkhAddress {
    network: Network,
    hash: Hash160,
}

impl P2pkhAddress {
    /// Create an address from a pubkey hash and network.
    pub fn from_pubkey_hash(hash: Hash160, network: Network) -> Self {
        Self { network, hash }
    }

    /// The pubkey hash encoded in this address.
    pub fn pubkey_hash(&self) -> Hash160 {
        self.hash
    }

    /// The network this address belongs to.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Encode as a Base58Check string.
    pub fn encode(&self) -> String {
        bs58::encode(self.hash.as_bytes())
            .with_check_version(self.network.p2pkh_version())
            .into_string()
    }

    /// Decode a Base58Check address string.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let payload = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(map_decode_error)?;

        // Payload is version byte + hash, checksum already stripped.
        if payload.len() != 21 {
            return Err(AddressError::InvalidLength(payload.len()));
        }
        let network = Network::from_p2pkh_version(payload[0])
            .ok_or(AddressError::UnknownVersion(payload[0]))?;

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        Ok(Self {
            network,
            hash: Hash160(hash),
        })
    }
}

fn map_decode_error(err: bs58::decode::Error) -> AddressError {
    use bs58::decode::Error;
    match err {
        Error::InvalidCharacter { character, .. } => AddressError::InvalidCharacter(character),
        Error::InvalidChecksum { .. } => AddressError::InvalidChecksum,
        other => AddressError::InvalidBase58(other.to_string()),
    }
}

impl fmt::Display for P2pkhAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for P2pkhAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for P2pkhAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for P2pkhAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator_hash() -> Hash160 {
        // HASH160 of the compressed secp256k1 generator point.
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hex::decode("751e76e8199196d454941c45d1b3a323f1433bd6").unwrap());
        Hash160(bytes)
    }

    // --- Encoding ---

    #[test]
    fn encode_mainnet_generator_vector() {
        let addr = P2pkhAddress::from_pubkey_hash(generator_hash(), Network::Mainnet);
        assert_eq!(addr.encode(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
    }

    #[test]
    fn encode_mainnet_starts_with_1() {
        let addr = P2pkhAddress::from_pubkey_hash(Hash160([0xAA; 20]), Network::Mainnet);
        assert!(addr.encode().starts_with('1'));
    }

    #[test]
    fn encode_testnet_prefix() {
        let addr = P2pkhAddress::from_pubkey_hash(Hash160([0xAA; 20]), Network::Testnet3);
        let first = addr.encode().chars().next().unwrap();
        assert!(first == 'm' || first == 'n', "unexpected prefix {first}");
    }

    #[test]
    fn encode_different_hashes_differ() {
        let a = P2pkhAddress::from_pubkey_hash(Hash160([0xAA; 20]), Network::Mainnet);
        let b = P2pkhAddress::from_pubkey_hash(Hash160([0xBB; 20]), Network::Mainnet);
        assert_ne!(a.encode(), b.encode());
    }

    // --- Decoding ---

    #[test]
    fn decode_mainnet_roundtrip() {
        let addr = P2pkhAddress::from_pubkey_hash(generator_hash(), Network::Mainnet);
        let decoded = P2pkhAddress::decode(&addr.encode()).unwrap();
        assert_eq!(addr, decoded);
    }

    #[test]
    fn decode_testnet_roundtrip() {
        let addr = P2pkhAddress::from_pubkey_hash(Hash160([0x42; 20]), Network::Testnet3);
        let decoded = P2pkhAddress::decode(&addr.encode()).unwrap();
        assert_eq!(addr, decoded);
        assert_eq!(decoded.network(), Network::Testnet3);
    }

    #[test]
    fn decode_corrupted_checksum() {
        let mut encoded = P2pkhAddress::from_pubkey_hash(generator_hash(), Network::Mainnet).encode();
        let last = encoded.pop().unwrap();
        encoded.push(if last == '2' { '3' } else { '2' });
        let err = P2pkhAddress::decode(&encoded).unwrap_err();
        assert_eq!(err, AddressError::InvalidChecksum);
    }

    #[test]
    fn decode_invalid_character() {
        // '0' is not in the base58 alphabet.
        let err = P2pkhAddress::decode("10OIl0").unwrap_err();
        assert!(matches!(err, AddressError::InvalidCharacter('0')));
    }

    #[test]
    fn decode_unknown_version() {
        // P2SH mainnet version byte 0x05 is not a supported address type.
        let encoded = bs58::encode(&[0x99u8; 20]).with_check_version(0x05).into_string();
        let err = P2pkhAddress::decode(&encoded).unwrap_err();
        assert_eq!(err, AddressError::UnknownVersion(0x05));
    }

    #[test]
    fn decode_wrong_payload_length() {
        let encoded = bs58::encode(&[0x99u8; 19]).with_check_version(0x00).into_string();
        let err = P2pkhAddress::decode(&encoded).unwrap_err();
        assert_eq!(err, AddressError::InvalidLength(20));
    }

    // --- Display / FromStr / serde ---

    #[test]
    fn display_matches_encode() {
        let addr = P2pkhAddress::from_pubkey_hash(generator_hash(), Network::Mainnet);
        assert_eq!(format!("{addr}"), addr.encode());
    }

    #[test]
    fn from_str_roundtrip() {
        let addr = P2pkhAddress::from_pubkey_hash(generator_hash(), Network::Mainnet);
        let parsed: P2pkhAddress = addr.encode().parse().unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn serde_json_as_string() {
        let addr = P2pkhAddress::from_pubkey_hash(generator_hash(), Network::Mainnet);
        let json = serde_json::to_string(&addr).unwrap();
        assert!(json.starts_with('"'));
        let back: P2pkhAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }
}
