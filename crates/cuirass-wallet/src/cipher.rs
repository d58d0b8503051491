//! AES-256-CFB encryption of private-key scalars.
//!
//! Every key record stores its 32-byte scalar as AES-256-CFB ciphertext
//! under the wallet AES key with a per-record 16-byte IV. CFB keeps the
//! ciphertext the same length as the plaintext; integrity comes from the
//! record checksums and the pubkey match on decrypt, not from the cipher.

use aes::Aes256;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};
use zeroize::Zeroizing;

type Aes256CfbEnc = Encryptor<Aes256>;
type Aes256CfbDec = Decryptor<Aes256>;

/// Encrypt a 32-byte private-key scalar.
pub fn encrypt_key(key: &[u8; 32], iv: &[u8; 16], plain: &[u8; 32]) -> [u8; 32] {
    let mut buf = *plain;
    Aes256CfbEnc::new(key.into(), iv.into()).encrypt(&mut buf);
    buf
}

/// Decrypt a 32-byte private-key scalar.
pub fn decrypt_key(key: &[u8; 32], iv: &[u8; 16], ciphertext: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    let mut buf = Zeroizing::new(*ciphertext);
    Aes256CfbDec::new(key.into(), iv.into()).decrypt(&mut *buf);
    buf
}
