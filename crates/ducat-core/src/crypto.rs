//! Ed25519 verification and address derivation.
//!
//! Public keys travel on the wire as PEM (SPKI) text, and an address is
//! the hex SHA-256 of that exact PEM string. An input's signature covers
//! the raw 32 bytes obtained by hex-decoding the transaction id, not the
//! id's ASCII form — both the wallet and the validator use this
//! convention.

use ed25519_dalek::pkcs8::spki::DecodePublicKey;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::error::CryptoError;
use crate::hashing::sha256_hex;

/// Derive the address owned by a PEM-encoded public key.
pub fn address_from_pem(pem: &str) -> String {
    sha256_hex(pem.as_bytes())
}

/// Verify an input's signature over a transaction id.
///
/// Parses the PEM public key, hex-decodes the signature (64 bytes) and
/// the id (the signed message bytes), and runs Ed25519 verification.
pub fn verify_input_signature(
    public_key_pem: &str,
    tx_id: &str,
    signature_hex: &str,
) -> Result<(), CryptoError> {
    let key = VerifyingKey::from_public_key_pem(public_key_pem)
        .map_err(|_| CryptoError::InvalidPublicKey)?;

    let sig_bytes = hex::decode(signature_hex).map_err(|_| CryptoError::InvalidSignature)?;
    let sig_arr: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;
    let signature = Signature::from_bytes(&sig_arr);

    let message = hex::decode(tx_id).map_err(|_| CryptoError::InvalidIdEncoding)?;

    key.verify(&message, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
    use ed25519_dalek::pkcs8::spki::EncodePublicKey;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair(seed: u8) -> (SigningKey, String) {
        let sk = SigningKey::from_bytes(&[seed; 32]);
        let pem = sk
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        (sk, pem)
    }

    fn sign_id(sk: &SigningKey, id: &str) -> String {
        let message = hex::decode(id).unwrap();
        hex::encode(sk.sign(&message).to_bytes())
    }

    #[test]
    fn address_is_hex_sha256_of_pem() {
        let (_, pem) = keypair(1);
        let addr = address_from_pem(&pem);
        assert_eq!(addr.len(), 64);
        assert_eq!(addr, sha256_hex(pem.as_bytes()));
    }

    #[test]
    fn addresses_differ_per_key() {
        let (_, pem1) = keypair(1);
        let (_, pem2) = keypair(2);
        assert_ne!(address_from_pem(&pem1), address_from_pem(&pem2));
    }

    #[test]
    fn verify_round_trip() {
        let (sk, pem) = keypair(7);
        let id = sha256_hex(b"some tx");
        let sig = sign_id(&sk, &id);
        assert!(verify_input_signature(&pem, &id, &sig).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_id() {
        let (sk, pem) = keypair(7);
        let id = sha256_hex(b"some tx");
        let sig = sign_id(&sk, &id);
        let other_id = sha256_hex(b"another tx");
        assert_eq!(
            verify_input_signature(&pem, &other_id, &sig),
            Err(CryptoError::VerificationFailed),
        );
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let (sk, _) = keypair(7);
        let (_, other_pem) = keypair(8);
        let id = sha256_hex(b"some tx");
        let sig = sign_id(&sk, &id);
        assert_eq!(
            verify_input_signature(&other_pem, &id, &sig),
            Err(CryptoError::VerificationFailed),
        );
    }

    #[test]
    fn verify_rejects_malformed_pem() {
        let (sk, _) = keypair(7);
        let id = sha256_hex(b"some tx");
        let sig = sign_id(&sk, &id);
        assert_eq!(
            verify_input_signature("not a pem", &id, &sig),
            Err(CryptoError::InvalidPublicKey),
        );
    }

    #[test]
    fn verify_rejects_short_signature() {
        let (_, pem) = keypair(7);
        let id = sha256_hex(b"some tx");
        assert_eq!(
            verify_input_signature(&pem, &id, "abcd"),
            Err(CryptoError::InvalidSignature),
        );
    }

    #[test]
    fn verify_rejects_non_hex_id() {
        let (sk, pem) = keypair(7);
        let id = sha256_hex(b"some tx");
        let sig = sign_id(&sk, &id);
        assert_eq!(
            verify_input_signature(&pem, "zzzz", &sig),
            Err(CryptoError::InvalidIdEncoding),
        );
    }
}
