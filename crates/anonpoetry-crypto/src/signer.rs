//! Local Ed25519 signer standing in for a user wallet
//!
//! Signatures carry the verifying key so a backend can recover the signer
//! address without a key registry: `verifying_key (32) || signature (64)`.
//! The address is the last 20 bytes of the BLAKE3 hash of the verifying key.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use anonpoetry_core::{Address, Signature, Signer, SignerError, TypedDataRequest};

use crate::error::{CryptoError, CryptoResult};

/// Size of the verifying key prefix in a signature
pub const VERIFYING_KEY_SIZE: usize = 32;

/// Size of the raw Ed25519 signature
pub const RAW_SIGNATURE_SIZE: usize = 64;

/// Total signature length produced by [`LocalSigner`]
pub const SIGNATURE_SIZE: usize = VERIFYING_KEY_SIZE + RAW_SIGNATURE_SIZE;

/// Derive an account address from a verifying key
pub fn address_of(verifying_key: &VerifyingKey) -> Address {
    let digest = blake3::hash(verifying_key.as_bytes());
    let mut address = [0u8; Address::LEN];
    address.copy_from_slice(&digest.as_bytes()[32 - Address::LEN..]);
    Address::new(address)
}

/// Verify a signature over a typed-data request and recover the signer
pub fn verify_typed_data(request: &TypedDataRequest, signature: &Signature) -> CryptoResult<Address> {
    let bytes = signature.as_bytes();
    if bytes.len() != SIGNATURE_SIZE {
        return Err(CryptoError::DataTooShort {
            expected: SIGNATURE_SIZE,
            actual: bytes.len(),
        });
    }

    let mut key_bytes = [0u8; VERIFYING_KEY_SIZE];
    key_bytes.copy_from_slice(&bytes[..VERIFYING_KEY_SIZE]);
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let mut sig_bytes = [0u8; RAW_SIGNATURE_SIZE];
    sig_bytes.copy_from_slice(&bytes[VERIFYING_KEY_SIZE..]);
    let raw = ed25519_dalek::Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(&request.signing_payload(), &raw)
        .map_err(|_| CryptoError::SignatureVerificationFailed)?;

    Ok(address_of(&verifying_key))
}

/// In-process wallet
///
/// Counts signature requests and can be told to refuse them, which is
/// how tests observe authorization caching and signer failures.
pub struct LocalSigner {
    signing_key: SigningKey,
    address: Address,
    rejecting: AtomicBool,
    sign_count: AtomicUsize,
}

impl LocalSigner {
    /// Generate a signer with a random key
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        rand::rng().fill_bytes(&mut seed[..]);
        Self::from_seed(*seed)
    }

    /// Deterministic signer from a 32-byte seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let address = address_of(&signing_key.verifying_key());
        Self {
            signing_key,
            address,
            rejecting: AtomicBool::new(false),
            sign_count: AtomicUsize::new(0),
        }
    }

    /// Refuse (or stop refusing) subsequent signature requests
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Number of signature requests received, including refused ones
    pub fn sign_count(&self) -> usize {
        self.sign_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Signature, SignerError> {
        self.sign_count.fetch_add(1, Ordering::SeqCst);

        if self.rejecting.load(Ordering::SeqCst) {
            return Err(SignerError::Rejected("user denied signature".to_string()));
        }

        let raw = self.signing_key.sign(&request.signing_payload());

        let mut bytes = Vec::with_capacity(SIGNATURE_SIZE);
        bytes.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        bytes.extend_from_slice(&raw.to_bytes());

        debug!(
            signer = %self.address.short_id(),
            primary_type = %request.primary_type,
            "Signed typed data"
        );
        Ok(Signature(bytes))
    }
}
