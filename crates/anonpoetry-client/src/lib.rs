//! # AnonPoetry Client
//!
//! Publish, reveal and rank private poems whose text lives on a
//! confidential ledger as encrypted 128-bit chunks.
//!
//! ## Components
//!
//! - [`EncryptedBatchBuilder`]: Typed values in, handles plus one proof out
//! - [`BatchDecryptor`]: All-or-nothing decryption of many handles at once
//! - [`reassemble_text`] / [`reassemble_count`]: Decrypted values back to content
//! - [`PoemContract`]: Typed calls to the poem contract over any [`Ledger`]
//! - [`PoetryClient`]: The publish / like / list / reveal / ranking flows
//! - [`MockPoemLedger`]: In-memory poem contract for tests and demos
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use anonpoetry_client::{ClientConfig, MockPoemLedger, PoetryClient};
//! use anonpoetry_core::{Signer, SystemClock};
//! use anonpoetry_crypto::{LocalSigner, MockConfidentialCompute};
//!
//! # async fn example() -> anonpoetry_core::PoetryResult<()> {
//! let config = ClientConfig::default();
//! let clock = Arc::new(SystemClock);
//! let compute = Arc::new(MockConfidentialCompute::new(clock.clone()));
//! let signer = Arc::new(LocalSigner::generate());
//! let ledger = MockPoemLedger::new(
//!     config.contract_address,
//!     signer.address(),
//!     compute.clone(),
//!     clock.clone(),
//! );
//!
//! let client = PoetryClient::new(config, Arc::new(ledger), compute, signer, clock);
//! let published = client.publish("Spring", "Petals on the water").await?;
//! let poem = client.reveal(published.poem_id).await?;
//! assert_eq!(poem.title.as_deref(), Some("Spring"));
//! # Ok(())
//! # }
//! ```
//!
//! [`Ledger`]: anonpoetry_core::Ledger

pub mod batch;
pub mod client;
pub mod config;
pub mod contract;
pub mod decrypt;
pub mod mock_ledger;
pub mod reassemble;

pub use batch::EncryptedBatchBuilder;
pub use client::{AccessGrant, PoemRecord, PoetryClient, RankingEntry};
pub use config::{ClientConfig, ConfigError, DEFAULT_CHAIN_ID, DEFAULT_CONTRACT_ADDRESS};
pub use contract::{Field, PoemContract, PoemId, PoemMeta, Published, abi};
pub use decrypt::BatchDecryptor;
pub use mock_ledger::{MockPoemLedger, PROTOCOL_ID};
pub use reassemble::{collect_chunks, reassemble_count, reassemble_text};
