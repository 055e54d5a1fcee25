//! # AnonPoetry Crypto
//!
//! Decryption authorization and the key material behind it.
//!
//! ## Features
//!
//! - Session-scoped, time-bounded decryption authorization with caching
//! - X25519 ephemeral keypairs and re-encryption of decrypted values
//! - Ed25519 local signer standing in for a wallet
//! - In-memory confidential-compute backend for tests and demos
//!
//! ## Key Types
//!
//! - [`AuthorizationManager`]: Issues and caches the session's authorization
//! - [`LocalSigner`]: In-process wallet
//! - [`MockConfidentialCompute`]: Encrypted value store with ACLs
//! - [`DecryptionDomain`]: Where signed decryption requests are verified
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use anonpoetry_core::{Address, Signer, SystemClock};
//! use anonpoetry_crypto::{AuthorizationConfig, AuthorizationManager, LocalSigner, MockConfidentialCompute};
//!
//! let clock = Arc::new(SystemClock);
//! let signer = Arc::new(LocalSigner::generate());
//! let compute = Arc::new(MockConfidentialCompute::new(clock.clone()));
//! let contract: Address = "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse()?;
//!
//! let manager = AuthorizationManager::new(
//!     compute,
//!     signer.clone(),
//!     clock,
//!     AuthorizationConfig::new(vec![contract]),
//! );
//! let auth = manager.ensure(&signer.address()).await?;
//! ```

pub mod authorization;
pub mod eip712;
pub mod error;
pub mod keys;
pub mod mock_compute;
pub mod signer;

// Re-exports
pub use authorization::{AuthorizationConfig, AuthorizationManager, AuthorizationState};
pub use eip712::{DEFAULT_GATEWAY_CHAIN_ID, DEFAULT_VERIFYING_CONTRACT, DecryptionDomain};
pub use error::{CryptoError, CryptoResult};
pub use keys::{generate_decryption_keypair, parse_public_key, parse_secret};
pub use mock_compute::MockConfidentialCompute;
pub use signer::{LocalSigner, address_of, verify_typed_data};
