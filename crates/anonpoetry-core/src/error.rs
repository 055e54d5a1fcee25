//! Error types for AnonPoetry
//!
//! Each failure kind the protocol distinguishes has its own enum so callers
//! can match on it. [`PoetryError`] collects them for code that crosses
//! component boundaries.

use thiserror::Error;

use crate::identity::{Address, Handle};

/// Top-level error type for AnonPoetry
#[derive(Debug, Error)]
pub enum PoetryError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid state: {0}")]
    InvalidState(#[from] InvalidStateError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Decryption error: {0}")]
    Decryption(#[from] DecryptionError),

    #[error("Missing handle: {0}")]
    MissingHandle(#[from] MissingHandleError),

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors turning recovered chunks back into content
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Reassembled bytes are not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Counter value {0} does not fit a 32-bit cell")]
    CounterOverflow(u128),
}

/// Misuse of a stateful builder
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidStateError {
    #[error("Batch has already been sealed")]
    AlreadySealed,

    #[error("Cannot add values to a sealed batch")]
    AddAfterSeal,
}

/// Errors reported by a signer (wallet)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("Signature request rejected: {0}")]
    Rejected(String),

    #[error("Signing failed: {0}")]
    Failed(String),
}

/// Errors obtaining a decryption authorization
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Keypair generation failed: {0}")]
    KeypairGeneration(String),

    #[error("Signer address {actual} does not match subject {expected}")]
    SubjectMismatch { expected: Address, actual: Address },
}

/// Errors from a bulk decryption request
#[derive(Debug, Error)]
pub enum DecryptionError {
    #[error("No handles requested")]
    EmptyRequest,

    #[error("Authorization expired at {expired_at} (now {now})")]
    AuthorizationExpired { expired_at: i64, now: i64 },

    #[error("Remote decryption failed: {0}")]
    Remote(#[from] ComputeError),

    #[error("Result is missing handle {missing}: requested {requested}, returned {returned}")]
    Incomplete {
        missing: Handle,
        requested: usize,
        returned: usize,
    },
}

/// A handle expected in a decrypted map was absent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Handle {handle} at position {position} absent from decrypted values")]
pub struct MissingHandleError {
    pub handle: Handle,
    pub position: usize,
}

/// Errors from the confidential-compute collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("User {user} is not allowed to decrypt handle {handle}")]
    AccessDenied { handle: Handle, user: Address },

    #[error("Unknown handle: {0}")]
    UnknownHandle(Handle),

    #[error("Expected {expected} handles, got {actual}")]
    HandleCountMismatch { expected: usize, actual: usize },

    #[error("Authorization rejected: {0}")]
    AuthorizationRejected(String),

    #[error("Compute backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the ledger collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Transaction submission failed: {0}")]
    SubmitFailed(String),

    #[error("Transaction reverted in {function}: {reason}")]
    Reverted { function: String, reason: String },

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid arguments for {function}: {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error("Unexpected return from {function}: expected {expected}")]
    UnexpectedReturn { function: String, expected: String },

    #[error("Expected event {0} in receipt")]
    MissingEvent(String),
}

/// Result type alias for AnonPoetry operations
pub type PoetryResult<T> = Result<T, PoetryError>;
