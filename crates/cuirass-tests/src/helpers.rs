//! Shared test helpers for the end-to-end wallet tests.

use cuirass_core::{BlockStamp, Hash256, Network};
use cuirass_wallet::{KdfParams, Wallet};

/// A block stamp with a per-height marker hash.
pub fn stamp(height: i32) -> BlockStamp {
    BlockStamp::new(height, Hash256([height as u8; 32]))
}

/// Small fixed KDF parameters so tests are wall-clock independent.
pub fn fast_kdf() -> KdfParams {
    KdfParams::new(1024, 2, [0x5C; 32]).unwrap()
}

/// A mainnet wallet with the given passphrase and keypool, at height 100.
pub fn wallet_with(passphrase: &[u8], keypool: usize) -> Wallet {
    Wallet::create_with_params(
        "acct",
        "e2e wallet",
        passphrase,
        Network::Mainnet,
        &stamp(100),
        keypool,
        fast_kdf(),
    )
    .unwrap()
}
