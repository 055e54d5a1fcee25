//! Signing domain for user decryption requests

use serde::{Deserialize, Serialize};

use anonpoetry_core::{Address, Eip712Domain, TypedDataRequest};

/// Gateway chain id used by the default decryption domain
pub const DEFAULT_GATEWAY_CHAIN_ID: u64 = 55815;

/// Default decryption verifying contract on the gateway chain
pub const DEFAULT_VERIFYING_CONTRACT: Address = Address::new([
    0x5f, 0xfd, 0xaa, 0xb0, 0x37, 0x3e, 0x62, 0xe2, 0xea, 0x29, 0x44, 0x77, 0x62, 0x09, 0xae, 0xf2,
    0x9e, 0x63, 0x1a, 0x64,
]);

/// Where user decryption requests are verified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionDomain {
    pub gateway_chain_id: u64,
    pub verifying_contract: Address,
}

impl Default for DecryptionDomain {
    fn default() -> Self {
        Self {
            gateway_chain_id: DEFAULT_GATEWAY_CHAIN_ID,
            verifying_contract: DEFAULT_VERIFYING_CONTRACT,
        }
    }
}

impl DecryptionDomain {
    pub fn new(gateway_chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            gateway_chain_id,
            verifying_contract,
        }
    }

    pub fn domain(&self) -> Eip712Domain {
        Eip712Domain {
            name: "Decryption".to_string(),
            version: "1".to_string(),
            chain_id: self.gateway_chain_id,
            verifying_contract: self.verifying_contract,
        }
    }

    /// Build the request a user signs to decrypt handles of `contracts`
    pub fn user_decrypt_request(
        &self,
        public_key: &str,
        contracts: &[Address],
        start_timestamp: i64,
        duration_days: u32,
    ) -> TypedDataRequest {
        TypedDataRequest::user_decrypt(
            self.domain(),
            public_key,
            contracts,
            start_timestamp,
            duration_days,
        )
    }
}
