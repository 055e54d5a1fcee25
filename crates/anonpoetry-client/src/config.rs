//! Configuration for the poetry client

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use anonpoetry_core::{Address, DEFAULT_DURATION_DAYS};
use anonpoetry_crypto::{
    AuthorizationConfig, DEFAULT_GATEWAY_CHAIN_ID, DEFAULT_VERIFYING_CONTRACT, DecryptionDomain,
};

/// Poem contract address of the local development deployment
pub const DEFAULT_CONTRACT_ADDRESS: Address = Address::new([
    0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f, 0x64, 0x2f,
    0x64, 0x18, 0x0a, 0xa3,
]);

/// Chain id of the local development network
pub const DEFAULT_CHAIN_ID: u64 = 31337;

/// Poems shown by the recent listing and the ranking
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// Errors loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for a [`PoetryClient`](crate::PoetryClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Poem contract address
    pub contract_address: Address,
    /// Chain the poem contract is deployed on
    pub chain_id: u64,
    /// Chain that verifies decryption requests
    pub gateway_chain_id: u64,
    /// Decryption verifying contract on the gateway chain
    pub verifying_contract_decryption: Address,
    /// Validity window of a decryption authorization
    pub authorization_duration_days: u32,
    /// Poems returned by `list_recent`
    pub recent_limit: usize,
    /// Entries returned by `ranking`
    pub ranking_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS,
            chain_id: DEFAULT_CHAIN_ID,
            gateway_chain_id: DEFAULT_GATEWAY_CHAIN_ID,
            verifying_contract_decryption: DEFAULT_VERIFYING_CONTRACT,
            authorization_duration_days: DEFAULT_DURATION_DAYS,
            recent_limit: DEFAULT_LIST_LIMIT,
            ranking_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Set the poem contract address
    pub fn with_contract_address(mut self, address: Address) -> Self {
        self.contract_address = address;
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Set the gateway chain and its verifying contract
    pub fn with_decryption_domain(mut self, gateway_chain_id: u64, verifying_contract: Address) -> Self {
        self.gateway_chain_id = gateway_chain_id;
        self.verifying_contract_decryption = verifying_contract;
        self
    }

    pub fn with_authorization_duration_days(mut self, days: u32) -> Self {
        self.authorization_duration_days = days;
        self
    }

    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    pub fn with_ranking_limit(mut self, limit: usize) -> Self {
        self.ranking_limit = limit;
        self
    }

    /// Signing domain for decryption requests
    pub fn decryption_domain(&self) -> DecryptionDomain {
        DecryptionDomain::new(self.gateway_chain_id, self.verifying_contract_decryption)
    }

    /// Authorization covering the poem contract
    pub fn authorization_config(&self) -> AuthorizationConfig {
        AuthorizationConfig::new(vec![self.contract_address])
            .with_duration_days(self.authorization_duration_days)
    }
}
