//! End-to-end lifecycle tests for the wallet engine.
//!
//! Each test exercises the full stack: wallet creation with keypool
//! pre-generation, container serialization, parsing, and the lock/unlock
//! machinery, without reaching into module internals.

use cuirass_core::{BlockStamp, Hash256, Network, P2pkhAddress, PrivateKey};
use cuirass_tests::helpers::{fast_kdf, stamp, wallet_with};
use cuirass_wallet::{Wallet, WalletError};

const PASSPHRASE: &[u8] = b"hunter2";

fn roundtrip(wallet: &Wallet) -> Wallet {
    let mut buf = Vec::new();
    wallet.write_to(&mut buf).unwrap();
    Wallet::read_from(&buf[..], wallet.network()).unwrap()
}

#[test]
fn create_serialize_parse_unlock() {
    let mut wallet = wallet_with(PASSPHRASE, 5);
    let mut handed_out = Vec::new();
    for _ in 0..5 {
        handed_out.push(wallet.next_chained_address(&stamp(100), 5).unwrap());
    }

    let parsed = roundtrip(&wallet);
    parsed.unlock(PASSPHRASE).unwrap();
    assert!(!parsed.is_locked());

    // The parsed wallet agrees on the fifth chained address.
    assert_eq!(parsed.last_chained_address(), handed_out[4]);
    assert_eq!(parsed.last_chained_address(), wallet.last_chained_address());
    assert_eq!(parsed.highest_used(), 4);
}

#[test]
fn wrong_passphrase_leaves_wallet_locked() {
    let wallet = wallet_with(PASSPHRASE, 5);
    let parsed = roundtrip(&wallet);

    assert!(parsed.unlock(b"wrong").is_err());
    assert!(parsed.is_locked());

    // The right passphrase still works afterwards.
    parsed.unlock(PASSPHRASE).unwrap();
    assert!(!parsed.is_locked());
}

#[test]
fn parsed_wallet_extends_the_same_chain() {
    // Hand out addresses before and after a round trip: the deterministic
    // chain must continue identically from the persisted root.
    let mut original = wallet_with(PASSPHRASE, 2);
    let mut expected = Vec::new();
    for _ in 0..6 {
        expected.push(original.next_chained_address(&stamp(100), 2).unwrap());
    }

    let mut reloaded = {
        let mut buf = Vec::new();
        let fresh = wallet_with(PASSPHRASE, 2);
        // Serialize before any handout so the reloaded wallet must extend
        // its own keypool past the persisted records.
        fresh.write_to(&mut buf).unwrap();
        Wallet::read_from(&buf[..], Network::Mainnet).unwrap()
    };
    reloaded.unlock(PASSPHRASE).unwrap();
    let mut continued = Vec::new();
    for _ in 0..6 {
        continued.push(reloaded.next_chained_address(&stamp(100), 2).unwrap());
    }

    // Different wallets chain from different roots.
    assert_ne!(expected, continued);
    // But a wallet and its reload chain identically.
    let reparsed = roundtrip(&reloaded);
    reparsed.unlock(PASSPHRASE).unwrap();
    assert_eq!(reparsed.last_chained_address(), continued[5]);
}

#[test]
fn address_keys_recoverable_after_reload() {
    let mut wallet = wallet_with(PASSPHRASE, 3);
    let address = wallet.next_chained_address(&stamp(100), 3).unwrap();

    let parsed = roundtrip(&wallet);
    parsed.unlock(PASSPHRASE).unwrap();

    let key = parsed.address_key(&address).unwrap();
    assert_eq!(key.public_key().hash160(true), address.pubkey_hash());
}

#[test]
fn import_duplicate_detected() {
    let mut wallet = wallet_with(PASSPHRASE, 1);
    let key = PrivateKey::random();

    let printable = wallet.import_private_key(&key, true, &stamp(100)).unwrap();
    let err = wallet.import_private_key(&key, true, &stamp(100)).unwrap_err();
    assert_eq!(err, WalletError::DuplicateAddress);

    // The import survives a round trip and its key is recoverable.
    let parsed = roundtrip(&wallet);
    parsed.unlock(PASSPHRASE).unwrap();
    let address: P2pkhAddress = printable.parse().unwrap();
    let recovered = parsed.address_key(&address).unwrap();
    assert_eq!(*recovered.to_bytes(), *key.to_bytes());
}

#[test]
fn keypool_monotonicity_across_reload() {
    let mut wallet = wallet_with(PASSPHRASE, 4);
    for n in 0..4i64 {
        wallet.next_chained_address(&stamp(100), 4).unwrap();
        assert_eq!(wallet.highest_used(), n);
    }

    let mut parsed = roundtrip(&wallet);
    assert_eq!(parsed.highest_used(), 3);
    parsed.unlock(PASSPHRASE).unwrap();

    // Pool is exhausted; the next handout extends the chain.
    parsed.next_chained_address(&stamp(100), 4).unwrap();
    assert_eq!(parsed.highest_used(), 4);
    assert!(parsed.last_chain_index() >= parsed.highest_used());
}

#[test]
fn recent_blocks_ring_through_wallet_api() {
    let mut wallet = wallet_with(PASSPHRASE, 1);
    for height in 1..=25 {
        wallet.set_synced_with(&stamp(height));
    }
    assert_eq!(wallet.synced_with().height, 25);

    // The ring holds heights 6..=25, oldest reachable by walking back.
    let mut iter = wallet.iter_recent_blocks().unwrap();
    let mut steps = 0;
    while iter.prev() {
        steps += 1;
    }
    assert_eq!(steps, 19);
    assert_eq!(iter.block_stamp(), stamp(6));
}

#[test]
fn rollback_then_resync_through_wallet_api() {
    let mut wallet = wallet_with(PASSPHRASE, 1);
    for height in 1..=25 {
        wallet.set_synced_with(&stamp(height));
    }

    // Roll back to a stamp whose hash is still in the ring: the ring
    // truncates below it and now tops out at height 19.
    wallet.set_synced_with(&stamp(20));
    assert_eq!(wallet.synced_with(), stamp(19));

    // A replacement block at height 20 continues the chain contiguously.
    let fork = BlockStamp::new(20, Hash256([0xFE; 32]));
    wallet.set_synced_with(&fork);
    assert_eq!(wallet.synced_with(), fork);
    let mut iter = wallet.iter_recent_blocks().unwrap();
    assert!(iter.prev());
    assert_eq!(iter.block_stamp(), stamp(19));
}

#[test]
fn recent_blocks_survive_reload() {
    let mut wallet = wallet_with(PASSPHRASE, 1);
    for height in 1..=7 {
        wallet.set_synced_with(&stamp(height));
    }

    let parsed = roundtrip(&wallet);
    assert_eq!(parsed.synced_with(), stamp(7));

    let mut iter = parsed.iter_recent_blocks().unwrap();
    let mut count = 1;
    while iter.prev() {
        count += 1;
    }
    assert_eq!(count, 7);
    assert_eq!(iter.block_stamp(), stamp(1));
}

#[test]
fn comments_survive_reload() {
    let mut wallet = wallet_with(PASSPHRASE, 2);
    let address = wallet.next_chained_address(&stamp(100), 2).unwrap();
    wallet.set_addr_comment(&address, b"savings").unwrap();
    let txid = Hash256([0x99; 32]);
    wallet.set_tx_comment(&txid, b"coffee beans").unwrap();

    let parsed = roundtrip(&wallet);
    assert_eq!(parsed.addr_comment(&address), Some(&b"savings"[..]));
    assert_eq!(parsed.tx_comment(&txid), Some(&b"coffee beans"[..]));
}

#[test]
fn sorted_addresses_stable_across_reload() {
    let mut wallet = wallet_with(PASSPHRASE, 3);
    wallet.next_chained_address(&stamp(100), 3).unwrap();
    wallet.next_chained_address(&stamp(100), 3).unwrap();
    wallet
        .import_private_key(&PrivateKey::random(), true, &stamp(100))
        .unwrap();

    let before = wallet.sorted_active_addresses();
    let parsed = roundtrip(&wallet);
    let after = parsed.sorted_active_addresses();
    assert_eq!(before, after);

    let indices: Vec<i64> = after.iter().map(|info| info.chain_index).collect();
    assert_eq!(indices, vec![-1, 0, 1, -2]);
}

#[test]
fn lock_zeroizes_across_engine() {
    let mut wallet = wallet_with(PASSPHRASE, 3);
    let address = wallet.next_chained_address(&stamp(100), 3).unwrap();
    wallet.address_key(&address).unwrap();

    wallet.lock().unwrap();
    assert!(wallet.is_locked());
    assert_eq!(
        wallet.address_key(&address).unwrap_err(),
        WalletError::Locked
    );

    wallet.unlock(PASSPHRASE).unwrap();
    wallet.address_key(&address).unwrap();
}

#[test]
fn file_roundtrip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("e2e.wallet");

    let mut wallet = wallet_with(PASSPHRASE, 2);
    let address = wallet.next_chained_address(&stamp(100), 2).unwrap();
    wallet.save_to_file(&path).unwrap();

    let loaded = Wallet::load_from_file(&path, Network::Mainnet).unwrap();
    loaded.unlock(PASSPHRASE).unwrap();
    assert_eq!(loaded.last_chained_address(), address);

    let err = Wallet::load_from_file(&path, Network::Testnet3).unwrap_err();
    assert!(matches!(err, WalletError::NetworkMismatch { .. }));
}

#[test]
fn testnet_wallet_addresses_carry_testnet_prefix() {
    let mut wallet = Wallet::create_with_params(
        "tnet",
        "",
        PASSPHRASE,
        Network::Testnet3,
        &stamp(10),
        2,
        fast_kdf(),
    )
    .unwrap();
    let address = wallet.next_chained_address(&stamp(10), 2).unwrap();
    let printable = address.encode();
    let first = printable.chars().next().unwrap();
    assert!(first == 'm' || first == 'n', "unexpected prefix {first}");
}
