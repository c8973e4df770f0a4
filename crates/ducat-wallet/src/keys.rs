//! The wallet's Ed25519 identity.
//!
//! A [`WalletKey`] signs transaction ids and derives the owner address:
//! the hex SHA-256 of the PEM-encoded public key. The PEM string is the
//! canonical public representation — it is what travels in transaction
//! inputs and what peers hash to check ownership.

use std::fmt;

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::spki::EncodePublicKey;
use ed25519_dalek::{Signer, SigningKey};

use ducat_core::crypto;

use crate::error::WalletError;

/// Ed25519 keypair owning a Ducat address.
///
/// The secret key is zeroized on drop by ed25519-dalek.
pub struct WalletKey {
    signing_key: SigningKey,
}

impl WalletKey {
    /// Generate a fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self { signing_key: SigningKey::generate(&mut csprng) }
    }

    /// Rebuild a key from 32-byte secret material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self { signing_key: SigningKey::from_bytes(&bytes) }
    }

    /// Raw secret key bytes. Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// PEM (SPKI) encoding of the public key, LF line endings.
    pub fn public_key_pem(&self) -> String {
        self.signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("ed25519 public key encodes to PEM")
    }

    /// The address owned by this key.
    pub fn address(&self) -> String {
        crypto::address_from_pem(&self.public_key_pem())
    }

    /// Sign a transaction id, returning the hex signature.
    ///
    /// The signed message is the hex-decoded id (32 raw bytes), matching
    /// what validators verify.
    pub fn sign_tx_id(&self, tx_id: &str) -> Result<String, WalletError> {
        let message =
            hex::decode(tx_id).map_err(|_| WalletError::MalformedId(tx_id.to_string()))?;
        Ok(hex::encode(self.signing_key.sign(&message).to_bytes()))
    }
}

impl Clone for WalletKey {
    fn clone(&self) -> Self {
        Self::from_secret_bytes(self.secret_bytes())
    }
}

impl fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ducat_core::hashing::sha256_hex;

    #[test]
    fn generate_is_unique() {
        assert_ne!(WalletKey::generate().address(), WalletKey::generate().address());
    }

    #[test]
    fn from_secret_is_deterministic() {
        let a = WalletKey::from_secret_bytes([9; 32]);
        let b = WalletKey::from_secret_bytes([9; 32]);
        assert_eq!(a.address(), b.address());
        assert_eq!(a.public_key_pem(), b.public_key_pem());
        assert_eq!(a.secret_bytes(), b.secret_bytes());
    }

    #[test]
    fn address_is_sha256_of_pem() {
        let key = WalletKey::from_secret_bytes([1; 32]);
        let pem = key.public_key_pem();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(key.address(), crypto::address_from_pem(&pem));
        assert_eq!(key.address().len(), 64);
    }

    #[test]
    fn signature_verifies() {
        let key = WalletKey::from_secret_bytes([2; 32]);
        let id = sha256_hex(b"a transaction");
        let sig = key.sign_tx_id(&id).unwrap();
        assert!(crypto::verify_input_signature(&key.public_key_pem(), &id, &sig).is_ok());
    }

    #[test]
    fn sign_rejects_non_hex_id() {
        let key = WalletKey::from_secret_bytes([2; 32]);
        assert!(matches!(
            key.sign_tx_id("not-hex").unwrap_err(),
            WalletError::MalformedId(_),
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let key = WalletKey::from_secret_bytes([3; 32]);
        let debug = format!("{key:?}");
        assert!(debug.contains("address"));
        assert!(!debug.contains(&hex::encode(key.secret_bytes())));
    }

    #[test]
    fn clone_preserves_identity() {
        let key = WalletKey::generate();
        assert_eq!(key.clone().address(), key.address());
    }
}
