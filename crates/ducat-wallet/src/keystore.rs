//! Password-encrypted key file.
//!
//! The secret key is stored under AES-256-GCM with an argon2id-derived
//! key. Wire format:
//! ```text
//! salt (16 bytes) || nonce (12 bytes) || ciphertext + auth tag
//! ```
//! A wrong password fails the authentication tag and surfaces as
//! [`WalletError::InvalidPassword`].

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::WalletError;
use crate::keys::WalletKey;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_ENCRYPTED_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

/// Derive a 256-bit encryption key from a password and salt (argon2id,
/// default parameters).
fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; 32], WalletError> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    Ok(key)
}

/// Encrypt plaintext with a password. Returns `salt || nonce || ciphertext`.
pub fn encrypt(plaintext: &[u8], password: &[u8]) -> Result<Vec<u8>, WalletError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let mut key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    key.zeroize();

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut blob = Vec::with_capacity(MIN_ENCRYPTED_LEN + plaintext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(blob: &[u8], password: &[u8]) -> Result<Vec<u8>, WalletError> {
    if blob.len() < MIN_ENCRYPTED_LEN {
        return Err(WalletError::CorruptedKeystore(format!(
            "encrypted data too short: {} < {MIN_ENCRYPTED_LEN}",
            blob.len(),
        )));
    }

    let salt = &blob[..SALT_LEN];
    let nonce_bytes = &blob[SALT_LEN..SALT_LEN + NONCE_LEN];
    let ciphertext = &blob[SALT_LEN + NONCE_LEN..];

    let mut key = derive_key(password, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    key.zeroize();

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| WalletError::InvalidPassword)
}

/// Write a key to `path`, encrypted under `password`.
pub fn save_key(path: &Path, key: &WalletKey, password: &[u8]) -> Result<(), WalletError> {
    let mut secret = key.secret_bytes();
    let blob = encrypt(&secret, password);
    secret.zeroize();
    std::fs::write(path, blob?)?;
    Ok(())
}

/// Load a key from `path`, decrypting with `password`.
pub fn load_key(path: &Path, password: &[u8]) -> Result<WalletKey, WalletError> {
    let blob = std::fs::read(path)?;
    let mut secret = decrypt(&blob, password)?;
    let bytes: [u8; 32] = secret.as_slice().try_into().map_err(|_| {
        WalletError::CorruptedKeystore(format!("secret is {} bytes, expected 32", secret.len()))
    })?;
    secret.zeroize();
    Ok(WalletKey::from_secret_bytes(bytes))
}
