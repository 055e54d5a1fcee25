//! # AnonPoetry Core
//!
//! Core traits, types, and errors for storing private text as encrypted
//! fixed-width integers on a confidential ledger.
//!
//! This crate holds everything the other crates agree on, so the same
//! publish and reveal logic runs against in-memory collaborators (for tests
//! and demos) and against a real confidential-compute backend.
//!
//! ## Key Traits
//!
//! - [`ConfidentialCompute`]: Batch encryption and bulk user decryption
//! - [`Signer`]: Structured (EIP-712 style) message signing, i.e. the wallet
//! - [`Ledger`]: Submit transactions, await inclusion, read view functions
//! - [`Clock`]: Time abstraction for testability
//!
//! ## Key Types
//!
//! - [`Chunk`]: 16 bytes of text packed into a `u128`
//! - [`Handle`]: Opaque reference to one encrypted value
//! - [`EncryptedValue`]: Typed plaintext submitted for encryption
//! - [`EncryptedBatch`]: Handles plus the single proof covering them
//! - [`DecryptionAuthorization`]: Time-bounded signed permission to decrypt
//!
//! ## Chunk codec
//!
//! ```rust
//! use anonpoetry_core::codec;
//!
//! let chunks = codec::encode("Hi");
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(codec::decode(&chunks).unwrap(), "Hi");
//! ```

pub mod authorization;
pub mod codec;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod traits;
pub mod value;

// Re-export main types
pub use authorization::*;
pub use codec::{CHUNK_BYTES, Chunk};
pub use error::*;
pub use identity::*;
pub use ledger::*;
pub use traits::*;
pub use value::*;
