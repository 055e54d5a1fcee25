//! Key material for decryption
//!
//! Two kinds of keys live here:
//!
//! - Ephemeral X25519 decryption keypairs. The public half goes into the
//!   signed authorization; the backend re-encrypts plaintexts to it so only
//!   the holder of the private half can read them.
//! - A symmetric [`StoreKey`] (ChaCha20-Poly1305) the in-memory backend uses
//!   to keep its ciphertext cells opaque.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use anonpoetry_core::DecryptionKeypair;

use crate::error::{CryptoError, CryptoResult};

/// Nonce size for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Key size (32 bytes)
pub const KEY_SIZE: usize = 32;

const REENCRYPT_CONTEXT: &str = "anonpoetry user-decrypt reencryption v1";

/// Random X25519 secret
///
/// x25519-dalek pins an older `rand_core`, so the secret is built from
/// bytes filled by the workspace rng.
pub fn random_secret() -> StaticSecret {
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    rand::rng().fill_bytes(&mut bytes[..]);
    StaticSecret::from(*bytes)
}

/// Generate a fresh decryption keypair, hex encoded
pub fn generate_decryption_keypair() -> DecryptionKeypair {
    let secret = random_secret();
    let public = PublicKey::from(&secret);
    DecryptionKeypair {
        public_key: format!("0x{}", hex::encode(public.as_bytes())),
        private_key: Zeroizing::new(format!("0x{}", hex::encode(secret.to_bytes()))),
    }
}

fn decode_key_hex(encoded: &str) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
    let raw = Zeroizing::new(
        hex::decode(encoded.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
    );
    if raw.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKey(format!(
            "expected {} bytes, got {}",
            KEY_SIZE,
            raw.len()
        )));
    }
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&raw);
    Ok(key)
}

/// Parse a hex-encoded X25519 public key
pub fn parse_public_key(encoded: &str) -> CryptoResult<PublicKey> {
    Ok(PublicKey::from(*decode_key_hex(encoded)?))
}

/// Parse a hex-encoded X25519 secret key
pub fn parse_secret(encoded: &str) -> CryptoResult<StaticSecret> {
    Ok(StaticSecret::from(*decode_key_hex(encoded)?))
}

fn cipher_for(key: &[u8]) -> CryptoResult<ChaCha20Poly1305> {
    ChaCha20Poly1305::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Encrypted data with nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// Nonce used for encryption
    pub nonce: [u8; NONCE_SIZE],
    /// The encrypted ciphertext
    pub ciphertext: Vec<u8>,
}

/// Symmetric key protecting stored ciphertext cells
pub struct StoreKey {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl StoreKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        rand::rng().fill_bytes(&mut key[..]);
        Self { key }
    }

    /// Create from raw key bytes
    pub fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Encrypt with a fresh random nonce
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
        let nonce = random_nonce();
        let ciphertext = cipher_for(&self.key[..])?
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok(EncryptedData { nonce, ciphertext })
    }

    pub fn decrypt(&self, encrypted: &EncryptedData) -> CryptoResult<Vec<u8>> {
        cipher_for(&self.key[..])?
            .decrypt(
                Nonce::from_slice(&encrypted.nonce),
                encrypted.ciphertext.as_slice(),
            )
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}

/// A plaintext re-encrypted to one recipient's public key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedValue {
    /// Ephemeral sender public key (needed for key derivation)
    pub ephemeral_public: [u8; KEY_SIZE],
    pub data: EncryptedData,
}

fn shared_key(secret: &StaticSecret, public: &PublicKey) -> Zeroizing<[u8; KEY_SIZE]> {
    let shared = secret.diffie_hellman(public);
    Zeroizing::new(blake3::derive_key(REENCRYPT_CONTEXT, shared.as_bytes()))
}

/// Re-encrypt `plaintext` so only the holder of `recipient`'s secret can open it
pub fn seal_for(recipient: &PublicKey, plaintext: &[u8]) -> CryptoResult<SealedValue> {
    let ephemeral = random_secret();
    let key = shared_key(&ephemeral, recipient);

    let nonce = random_nonce();
    let ciphertext = cipher_for(&key[..])?
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(SealedValue {
        ephemeral_public: PublicKey::from(&ephemeral).to_bytes(),
        data: EncryptedData { nonce, ciphertext },
    })
}

/// Open a value sealed with [`seal_for`]
pub fn open_sealed(sealed: &SealedValue, secret: &StaticSecret) -> CryptoResult<Vec<u8>> {
    let key = shared_key(secret, &PublicKey::from(sealed.ephemeral_public));
    cipher_for(&key[..])?
        .decrypt(
            Nonce::from_slice(&sealed.data.nonce),
            sealed.data.ciphertext.as_slice(),
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let a = generate_decryption_keypair();
        let b = generate_decryption_keypair();

        assert_ne!(a.public_key, b.public_key);
        assert!(a.public_key.starts_with("0x"));
        assert_eq!(a.public_key.len(), 2 + KEY_SIZE * 2);

        // Public half is derivable from the private half
        let secret = parse_secret(&a.private_key).unwrap();
        let public = parse_public_key(&a.public_key).unwrap();
        assert_eq!(PublicKey::from(&secret).as_bytes(), public.as_bytes());
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!(matches!(
            parse_public_key("0x1234"),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            parse_secret("not hex"),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_store_key_encrypt_decrypt() {
        let key = StoreKey::generate();
        let encrypted = key.encrypt(b"cell").unwrap();
        assert_eq!(key.decrypt(&encrypted).unwrap(), b"cell");

        let other = StoreKey::generate();
        assert!(other.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_different_nonces() {
        let key = StoreKey::from_bytes([7; KEY_SIZE]);
        let a = key.encrypt(b"same").unwrap();
        let b = key.encrypt(b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_seal_and_open() {
        let keypair = generate_decryption_keypair();
        let public = parse_public_key(&keypair.public_key).unwrap();
        let secret = parse_secret(&keypair.private_key).unwrap();

        let sealed = seal_for(&public, &42u128.to_be_bytes()).unwrap();
        let opened = open_sealed(&sealed, &secret).unwrap();
        assert_eq!(opened, 42u128.to_be_bytes());

        // A different secret cannot open it
        let stranger = random_secret();
        assert!(open_sealed(&sealed, &stranger).is_err());
    }
}
