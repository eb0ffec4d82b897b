use anyhow::{anyhow, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::Rng;
use zeroize::{Zeroize, ZeroizeOnDrop};

const NONCE_LEN: usize = 12;

/// Master key sealing secrets at rest. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

pub fn generate_key() -> EncryptionKey {
    EncryptionKey(rand::thread_rng().gen())
}

/// Returns `None` unless `bytes` is exactly 32 bytes long.
pub fn load_key(bytes: &[u8]) -> Option<EncryptionKey> {
    let arr: [u8; 32] = bytes.try_into().ok()?;
    Some(EncryptionKey(arr))
}

/// Encrypts `plaintext` and returns `hex(nonce || ciphertext)`.
pub fn seal(key: &EncryptionKey, plaintext: &str) -> Result<String> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce: [u8; NONCE_LEN] = rand::thread_rng().gen();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| anyhow!("encryption failed"))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(hex::encode(out))
}

pub fn open(key: &EncryptionKey, sealed: &str) -> Result<String> {
    let raw = hex::decode(sealed).map_err(|_| anyhow!("sealed value is not hex"))?;
    if raw.len() < NONCE_LEN {
        return Err(anyhow!("sealed value is truncated"));
    }
    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| anyhow!("decryption failed: wrong key or tampered value"))?;
    String::from_utf8(plaintext).map_err(|_| anyhow!("sealed value is not utf-8"))
}
