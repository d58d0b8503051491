//! Error types for the Cuirass core primitives.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key scalar")] InvalidPrivateKey,
    #[error("invalid public key encoding")] InvalidPublicKey,
    #[error("invalid chaincode length: {0}")] InvalidChaincode(usize),
    #[error("signature verification failed")] VerificationFailed,
    #[error("derived public key does not match stored public key")] PubkeyMismatch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid payload length: {0}")] InvalidLength(usize),
    #[error("unknown version byte: {0:#04x}")] UnknownVersion(u8),
    #[error("invalid base58: {0}")] InvalidBase58(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("unknown network magic: {0:02x?}")] UnknownMagic([u8; 4]),
}
