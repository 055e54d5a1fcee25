//! Error types for anonpoetry-crypto

use anonpoetry_core::{AuthorizationError, ComputeError, SignerError};
use thiserror::Error;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    #[error("Data too short: expected at least {expected} bytes, got {actual}")]
    DataTooShort { expected: usize, actual: usize },
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for ComputeError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::EncryptionFailed(msg) => ComputeError::EncryptionFailed(msg),
            CryptoError::SignatureVerificationFailed => {
                ComputeError::AuthorizationRejected("signature verification failed".to_string())
            }
            other => ComputeError::DecryptionFailed(other.to_string()),
        }
    }
}

impl From<CryptoError> for AuthorizationError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyGenerationFailed(msg) => AuthorizationError::KeypairGeneration(msg),
            other => AuthorizationError::Signer(SignerError::Failed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_error_display() {
        let err = CryptoError::EncryptionFailed("bad key".to_string());
        assert!(format!("{}", err).contains("Encryption failed"));
        assert!(format!("{}", err).contains("bad key"));

        let err = CryptoError::InvalidKey("wrong length".to_string());
        assert!(format!("{}", err).contains("Invalid key"));

        let err = CryptoError::DataTooShort {
            expected: 32,
            actual: 16,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Data too short"));
        assert!(msg.contains("32"));
        assert!(msg.contains("16"));
    }

    #[test]
    fn test_into_compute_error() {
        let err: ComputeError = CryptoError::SignatureVerificationFailed.into();
        assert!(matches!(err, ComputeError::AuthorizationRejected(_)));

        let err: ComputeError = CryptoError::InvalidKey("short".to_string()).into();
        assert!(matches!(err, ComputeError::DecryptionFailed(_)));
    }

    #[test]
    fn test_into_authorization_error() {
        let err: AuthorizationError = CryptoError::KeyGenerationFailed("rng".to_string()).into();
        assert!(matches!(err, AuthorizationError::KeypairGeneration(_)));
    }
}
