//! Wallet composition: key chain, maps, and the lock state machine.
//!
//! The [`Wallet`] ties together the KDF parameters, the root key record, the
//! pre-generated keypool of chained addresses, imported keys, comments, and
//! the recent-blocks ring. The AES key derived from the passphrase lives in
//! a mutex-guarded slot between unlock and lock; plaintext private keys are
//! cached per record and dropped together when the wallet locks.
//!
//! The maps themselves are not internally synchronized: callers serialize
//! mutating operations against one another, while read-only views of a
//! quiescent wallet may run concurrently.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info};
use zeroize::Zeroizing;

use cuirass_core::crypto::verify_keypair;
use cuirass_core::{BlockStamp, Hash160, Hash256, Network, P2pkhAddress, PrivateKey};

use crate::address::{Address, IMPORTED_CHAIN_INDEX, ROOT_CHAIN_INDEX};
use crate::chain::chained_priv_key;
use crate::container::WalletFlags;
use crate::entry::check_comment_len;
use crate::error::WalletError;
use crate::kdf::KdfParams;
use crate::recent::{RecentBlocks, RecentBlocksIter};

/// Longest wallet name the header can hold, in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Longest wallet description the header can hold, in bytes.
pub const MAX_DESC_LEN: usize = 256;

/// Keypool extension used when callers pass no preference.
pub const DEFAULT_KEYPOOL_SIZE: usize = 100;

/// The wallet aggregate.
pub struct Wallet {
    pub(crate) net: Network,
    pub(crate) flags: WalletFlags,
    pub(crate) unique_id: [u8; 6],
    pub(crate) create_date: i64,
    pub(crate) name: String,
    pub(crate) desc: String,
    /// Highest chain index actually handed out; −1 when only the root
    /// exists.
    pub(crate) highest_used: i64,
    pub(crate) kdf_params: KdfParams,
    pub(crate) recent: RecentBlocks,
    /// Every key record, keyed by pubkey hash.
    pub(crate) addr_map: HashMap<Hash160, Address>,
    pub(crate) addr_comments: HashMap<Hash160, Vec<u8>>,
    pub(crate) tx_comments: HashMap<Hash256, Vec<u8>>,
    /// Dense chain-index map from −1 (root) through `last_chain_idx`.
    pub(crate) chain_idx: BTreeMap<i64, Hash160>,
    /// Imported records in insertion order.
    pub(crate) imported: Vec<Hash160>,
    pub(crate) last_chain_idx: i64,
    /// The derived AES key while unlocked.
    pub(crate) secret: Mutex<Option<Zeroizing<[u8; 32]>>>,
}

/// Read-only view of one tracked address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: P2pkhAddress,
    pub chain_index: i64,
    pub compressed: bool,
    pub imported: bool,
    pub first_seen: i64,
    pub last_seen: i64,
    pub first_block: i32,
    pub last_block: i32,
}

impl Wallet {
    /// Create a new wallet with self-calibrated KDF parameters.
    ///
    /// Generates a random root key and chaincode, verifies the root
    /// keypair, encrypts it under the passphrase-derived AES key, and
    /// pre-generates `keypool_size` chained addresses. The returned wallet
    /// is unlocked.
    pub fn create(
        name: &str,
        desc: &str,
        passphrase: &[u8],
        net: Network,
        bs: &BlockStamp,
        keypool_size: usize,
    ) -> Result<Self, WalletError> {
        Self::create_with_params(
            name,
            desc,
            passphrase,
            net,
            bs,
            keypool_size,
            KdfParams::compute_default(),
        )
    }

    /// Create a new wallet with explicit KDF parameters.
    pub fn create_with_params(
        name: &str,
        desc: &str,
        passphrase: &[u8],
        net: Network,
        bs: &BlockStamp,
        keypool_size: usize,
        kdf_params: KdfParams,
    ) -> Result<Self, WalletError> {
        if name.len() > MAX_NAME_LEN {
            return Err(WalletError::NameTooLong { max: MAX_NAME_LEN });
        }
        if desc.len() > MAX_DESC_LEN {
            return Err(WalletError::DescriptionTooLong { max: MAX_DESC_LEN });
        }

        let root_key = PrivateKey::random();
        let mut chaincode = [0u8; 32];
        OsRng.fill_bytes(&mut chaincode);
        let mut unique_id = [0u8; 6];
        OsRng.fill_bytes(&mut unique_id);

        let mut root = Address::new(&root_key, None, bs, true, chaincode, ROOT_CHAIN_INDEX);
        verify_keypair(&root_key, root.pub_key())?;

        let aes_key = kdf_params.derive_key(passphrase);
        root.encrypt(&aes_key)?;

        let mut recent = RecentBlocks::new();
        if bs.height >= 0 {
            recent.sync_to(bs);
        }

        let mut wallet = Self {
            net,
            flags: WalletFlags {
                use_encryption: true,
                watching_only: false,
            },
            unique_id,
            create_date: Utc::now().timestamp(),
            name: name.to_owned(),
            desc: desc.to_owned(),
            highest_used: ROOT_CHAIN_INDEX,
            kdf_params,
            recent,
            addr_map: HashMap::new(),
            addr_comments: HashMap::new(),
            tx_comments: HashMap::new(),
            chain_idx: BTreeMap::new(),
            imported: Vec::new(),
            last_chain_idx: ROOT_CHAIN_INDEX,
            secret: Mutex::new(None),
        };
        wallet.chain_idx.insert(ROOT_CHAIN_INDEX, root.pub_key_hash());
        wallet.addr_map.insert(root.pub_key_hash(), root);

        wallet.extend_keypool(keypool_size, bs, &aes_key)?;
        *wallet.secret.lock() = Some(Zeroizing::new(*aes_key));

        info!(net = %net, keypool = keypool_size, "created wallet");
        Ok(wallet)
    }

    /// Derive the AES key from the passphrase and verify it against the
    /// root record.
    ///
    /// The root's decryption check (recomputed pubkey must match the stored
    /// one) is what rejects a wrong passphrase. On success the key is
    /// retained for subsequent operations.
    pub fn unlock(&self, passphrase: &[u8]) -> Result<(), WalletError> {
        let aes_key = self.kdf_params.derive_key(passphrase);
        self.key_generator().unlock(&aes_key)?;
        *self.secret.lock() = Some(Zeroizing::new(*aes_key));
        debug!("wallet unlocked");
        Ok(())
    }

    /// Drop the AES key and every cached plaintext private key.
    ///
    /// Zeroization is best effort: after this returns, no wallet field and
    /// no record holds a live plaintext reference.
    pub fn lock(&self) -> Result<(), WalletError> {
        {
            let mut secret = self.secret.lock();
            if secret.is_none() {
                return Err(WalletError::AlreadyLocked);
            }
            *secret = None;
        }
        for record in self.addr_map.values() {
            record.lock()?;
        }
        debug!("wallet locked");
        Ok(())
    }

    /// Whether the AES key is currently absent.
    pub fn is_locked(&self) -> bool {
        self.secret.lock().is_none()
    }

    /// Hand out the next chained address.
    ///
    /// Serves from the pre-generated keypool when possible, which works on a
    /// locked wallet. When the pool is exhausted the wallet must be unlocked
    /// so the chain can be extended by `keypool_size` before retrying once.
    ///
    /// # Panics
    ///
    /// Panics if the next chain index is still absent after the extension,
    /// which is an internal-invariant violation; asking for a `keypool_size`
    /// of zero against an exhausted pool is the one way callers can reach
    /// it.
    pub fn next_chained_address(
        &mut self,
        bs: &BlockStamp,
        keypool_size: usize,
    ) -> Result<P2pkhAddress, WalletError> {
        if let Some(hash) = self.chain_idx.get(&(self.highest_used + 1)) {
            self.highest_used += 1;
            return Ok(P2pkhAddress::from_pubkey_hash(*hash, self.net));
        }

        let aes_key = self.secret_key()?;
        self.extend_keypool(keypool_size, bs, &aes_key)?;

        let hash = self
            .chain_idx
            .get(&(self.highest_used + 1))
            .expect("keypool extension did not produce the next chain index");
        self.highest_used += 1;
        Ok(P2pkhAddress::from_pubkey_hash(*hash, self.net))
    }

    /// The most recently handed out chained address (the root before any
    /// were handed out).
    pub fn last_chained_address(&self) -> P2pkhAddress {
        let hash = self
            .chain_idx
            .get(&self.highest_used)
            .expect("chain index map is dense from the root");
        P2pkhAddress::from_pubkey_hash(*hash, self.net)
    }

    /// Import an external private key as a non-chained record.
    ///
    /// Returns the printable P2PKH form. The keypool position counters are
    /// untouched.
    pub fn import_private_key(
        &mut self,
        key: &PrivateKey,
        compressed: bool,
        bs: &BlockStamp,
    ) -> Result<String, WalletError> {
        let hash = key.public_key().hash160(compressed);
        if self.addr_map.contains_key(&hash) {
            return Err(WalletError::DuplicateAddress);
        }
        let aes_key = self.secret_key()?;

        let mut record = Address::new(key, None, bs, compressed, [0u8; 32], IMPORTED_CHAIN_INDEX);
        verify_keypair(key, record.pub_key())?;
        record.encrypt(&aes_key)?;

        let address = P2pkhAddress::from_pubkey_hash(hash, self.net);
        self.addr_map.insert(hash, record);
        self.imported.push(hash);
        info!(address = %address, "imported private key");
        Ok(address.encode())
    }

    /// The private key behind one of this wallet's addresses.
    pub fn address_key(&self, address: &P2pkhAddress) -> Result<PrivateKey, WalletError> {
        let record = self
            .addr_map
            .get(&address.pubkey_hash())
            .ok_or(WalletError::AddressNotFound)?;
        if !record.flags().has_pub_key {
            return Err(WalletError::MissingPubKey);
        }
        if !record.flags().has_priv_key {
            return Err(WalletError::MissingPrivKey);
        }
        let aes_key = self.secret_key()?;
        let plain = record.unlock(&aes_key)?;
        Ok(PrivateKey::from_bytes(&plain)?)
    }

    /// Read-only view of one tracked address.
    pub fn address_info(&self, address: &P2pkhAddress) -> Result<AddressInfo, WalletError> {
        let record = self
            .addr_map
            .get(&address.pubkey_hash())
            .ok_or(WalletError::AddressNotFound)?;
        Ok(self.info_for(record))
    }

    /// Views of every active address, keyed by printable form.
    pub fn active_addresses(&self) -> HashMap<P2pkhAddress, AddressInfo> {
        self.sorted_active_addresses()
            .into_iter()
            .map(|info| (info.address, info))
            .collect()
    }

    /// Active addresses in chain-index order (root first, through the
    /// highest handed out), followed by imported records in insertion
    /// order.
    pub fn sorted_active_addresses(&self) -> Vec<AddressInfo> {
        let mut infos = Vec::new();
        for index in ROOT_CHAIN_INDEX..=self.highest_used {
            if let Some(record) = self.chain_idx.get(&index).and_then(|h| self.addr_map.get(h)) {
                infos.push(self.info_for(record));
            }
        }
        for record in self.imported.iter().filter_map(|h| self.addr_map.get(h)) {
            infos.push(self.info_for(record));
        }
        infos
    }

    // --- Comments ---

    /// Attach a comment to an address. Bounded by the wire limit.
    pub fn set_addr_comment(
        &mut self,
        address: &P2pkhAddress,
        comment: &[u8],
    ) -> Result<(), WalletError> {
        check_comment_len(comment)?;
        self.addr_comments
            .insert(address.pubkey_hash(), comment.to_vec());
        Ok(())
    }

    /// The comment attached to an address, if any.
    pub fn addr_comment(&self, address: &P2pkhAddress) -> Option<&[u8]> {
        self.addr_comments
            .get(&address.pubkey_hash())
            .map(Vec::as_slice)
    }

    /// Attach a comment to a transaction. Bounded by the wire limit.
    pub fn set_tx_comment(&mut self, txid: &Hash256, comment: &[u8]) -> Result<(), WalletError> {
        check_comment_len(comment)?;
        self.tx_comments.insert(*txid, comment.to_vec());
        Ok(())
    }

    /// The comment attached to a transaction, if any.
    pub fn tx_comment(&self, txid: &Hash256) -> Option<&[u8]> {
        self.tx_comments.get(txid).map(Vec::as_slice)
    }

    // --- Chain sync bookkeeping ---

    /// Record a newly synced block stamp.
    pub fn set_synced_with(&mut self, bs: &BlockStamp) {
        self.recent.sync_to(bs);
    }

    /// The newest synced stamp.
    pub fn synced_with(&self) -> BlockStamp {
        self.recent.synced_with()
    }

    /// Walk the recent-blocks ring from the newest entry. `None` when the
    /// ring is empty.
    pub fn iter_recent_blocks(&self) -> Option<RecentBlocksIter<'_>> {
        self.recent.iter()
    }

    /// Earliest block height any of this wallet's keys could appear in,
    /// floored at zero.
    pub fn earliest_block_height(&self) -> i32 {
        let mut earliest = self.key_generator().first_block();
        for record in self.imported.iter().filter_map(|h| self.addr_map.get(h)) {
            earliest = earliest.min(record.first_block());
        }
        earliest.max(0)
    }

    /// Raise the root record's first-block mark. Never lowers it.
    pub fn set_better_earliest_block_height(&mut self, height: i32) {
        let root_hash = *self
            .chain_idx
            .get(&ROOT_CHAIN_INDEX)
            .expect("root chain index present");
        let root = self
            .addr_map
            .get_mut(&root_hash)
            .expect("root record present");
        if height > root.first_block() {
            root.set_first_block(height);
        }
    }

    // --- Accessors ---

    pub fn create_date(&self) -> i64 {
        self.create_date
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.desc
    }

    pub fn network(&self) -> Network {
        self.net
    }

    pub fn unique_id(&self) -> &[u8; 6] {
        &self.unique_id
    }

    pub fn highest_used(&self) -> i64 {
        self.highest_used
    }

    pub fn last_chain_index(&self) -> i64 {
        self.last_chain_idx
    }

    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf_params
    }

    // --- Internals ---

    /// The root key record.
    pub(crate) fn key_generator(&self) -> &Address {
        let hash = self
            .chain_idx
            .get(&ROOT_CHAIN_INDEX)
            .expect("root chain index present");
        self.addr_map.get(hash).expect("root record present")
    }

    /// A caller-owned copy of the AES key, or `Locked`.
    fn secret_key(&self) -> Result<Zeroizing<[u8; 32]>, WalletError> {
        self.secret
            .lock()
            .as_ref()
            .map(|key| Zeroizing::new(**key))
            .ok_or(WalletError::Locked)
    }

    /// Grow the chain by `n` addresses past `last_chain_idx`.
    ///
    /// Walks parent to child: each child scalar is derived from the current
    /// chain tip, verified as a keypair, encrypted, and becomes the parent
    /// for the next step.
    fn extend_keypool(
        &mut self,
        n: usize,
        bs: &BlockStamp,
        aes_key: &[u8; 32],
    ) -> Result<(), WalletError> {
        let parent_hash = *self
            .chain_idx
            .get(&self.last_chain_idx)
            .expect("chain index map is dense");
        let parent = self
            .addr_map
            .get(&parent_hash)
            .expect("chain index entries resolve");

        let mut parent_priv = parent.unlock(aes_key)?;
        let mut parent_pub = parent.pub_key_bytes();
        let chaincode = *parent.chaincode();
        let mut next_index = parent.chain_index() + 1;

        for _ in 0..n {
            let child_bytes = chained_priv_key(&parent_priv, Some(&parent_pub), &chaincode)?;
            let child_key = PrivateKey::from_bytes(&child_bytes)?;
            let mut child = Address::new(&child_key, None, bs, true, chaincode, next_index);
            verify_keypair(&child_key, child.pub_key())?;
            child.encrypt(aes_key)?;

            parent_priv = child_bytes;
            parent_pub = child.pub_key_bytes();

            self.chain_idx.insert(next_index, child.pub_key_hash());
            self.addr_map.insert(child.pub_key_hash(), child);
            self.last_chain_idx = next_index;
            next_index += 1;
        }

        debug!(extended = n, last_chain_idx = self.last_chain_idx, "extended keypool");
        Ok(())
    }

    fn info_for(&self, record: &Address) -> AddressInfo {
        AddressInfo {
            address: record.address(self.net),
            chain_index: record.chain_index(),
            compressed: record.flags().compressed,
            imported: record.chain_index() == IMPORTED_CHAIN_INDEX,
            first_seen: record.first_seen(),
            last_seen: record.last_seen(),
            first_block: record.first_block(),
            last_block: record.last_block(),
        }
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("name", &self.name)
            .field("network", &self.net)
            .field("addresses", &self.addr_map.len())
            .field("highest_used", &self.highest_used)
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}
