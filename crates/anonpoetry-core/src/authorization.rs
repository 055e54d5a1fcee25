//! Decryption authorization types
//!
//! A user proves to the compute backend that it may decrypt handles by
//! signing a structured (EIP-712 style) request naming an ephemeral public
//! key, the contracts in scope, and a validity window. The signed result is
//! a [`DecryptionAuthorization`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::identity::Address;

/// Seconds in one day of authorization validity
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Default authorization lifetime in days
pub const DEFAULT_DURATION_DAYS: u32 = 365;

/// Primary type name of the user decryption request
pub const USER_DECRYPT_PRIMARY_TYPE: &str = "UserDecryptRequestVerification";

/// Signing domain of a structured message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

/// One field of a structured type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl TypedField {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Message body of a user decryption request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDecryptRequest {
    pub public_key: String,
    pub contract_addresses: Vec<Address>,
    pub start_timestamp: i64,
    pub duration_days: u32,
    pub extra_data: String,
}

/// A structured signing request: domain, type schema, and message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataRequest {
    pub domain: Eip712Domain,
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub primary_type: String,
    pub message: UserDecryptRequest,
}

impl TypedDataRequest {
    /// Build the standard user decryption request
    pub fn user_decrypt(
        domain: Eip712Domain,
        public_key: impl Into<String>,
        contract_addresses: &[Address],
        start_timestamp: i64,
        duration_days: u32,
    ) -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            USER_DECRYPT_PRIMARY_TYPE.to_string(),
            vec![
                TypedField::new("publicKey", "bytes"),
                TypedField::new("contractAddresses", "address[]"),
                TypedField::new("startTimestamp", "uint256"),
                TypedField::new("durationDays", "uint256"),
                TypedField::new("extraData", "bytes"),
            ],
        );

        Self {
            domain,
            types,
            primary_type: USER_DECRYPT_PRIMARY_TYPE.to_string(),
            message: UserDecryptRequest {
                public_key: public_key.into(),
                contract_addresses: contract_addresses.to_vec(),
                start_timestamp,
                duration_days,
                extra_data: "0x00".to_string(),
            },
        }
    }

    /// Canonical bytes a signer commits to
    ///
    /// `types` is a `BTreeMap`, so the JSON encoding is stable.
    pub fn signing_payload(&self) -> Vec<u8> {
        // Serializing plain structs with string keys cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Signature bytes produced by a signer
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "crate::value::hex_bytes")] pub Vec<u8>);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

/// Ephemeral keypair used to receive re-encrypted plaintexts
pub struct DecryptionKeypair {
    /// Hex-encoded public key, included in the signed request
    pub public_key: String,
    /// Hex-encoded private key, never leaves the process
    pub private_key: Zeroizing<String>,
}

impl fmt::Debug for DecryptionKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionKeypair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// A signed, time-bounded permission to decrypt handles for one user
///
/// Valid while `now < start_timestamp + duration_days * 86400`.
#[derive(Clone)]
pub struct DecryptionAuthorization {
    pub public_key: String,
    pub private_key: Zeroizing<String>,
    pub signature: Signature,
    pub user_address: Address,
    pub contract_addresses: Vec<Address>,
    /// Unix seconds
    pub start_timestamp: i64,
    pub duration_days: u32,
}

impl DecryptionAuthorization {
    /// Assemble an authorization from a keypair and the signed request
    pub fn new(
        keypair: DecryptionKeypair,
        signature: Signature,
        user_address: Address,
        request: &UserDecryptRequest,
    ) -> Self {
        Self {
            public_key: keypair.public_key,
            private_key: keypair.private_key,
            signature,
            user_address,
            contract_addresses: request.contract_addresses.clone(),
            start_timestamp: request.start_timestamp,
            duration_days: request.duration_days,
        }
    }

    /// Unix timestamp at which the authorization stops being valid
    pub fn expires_at(&self) -> i64 {
        self.start_timestamp
            .saturating_add(i64::from(self.duration_days) * SECONDS_PER_DAY)
    }

    /// Whether the authorization is usable at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() < self.expires_at()
    }

    /// Whether `contract` is covered by the signature
    pub fn covers(&self, contract: &Address) -> bool {
        self.contract_addresses.contains(contract)
    }
}

impl fmt::Debug for DecryptionAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionAuthorization")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("signature", &self.signature)
            .field("user_address", &self.user_address)
            .field("contract_addresses", &self.contract_addresses)
            .field("start_timestamp", &self.start_timestamp)
            .field("duration_days", &self.duration_days)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn domain() -> Eip712Domain {
        Eip712Domain {
            name: "Decryption".to_string(),
            version: "1".to_string(),
            chain_id: 55815,
            verifying_contract: Address::new([9; 20]),
        }
    }

    fn authorization(start: i64, days: u32) -> DecryptionAuthorization {
        let contract = Address::new([1; 20]);
        let request = TypedDataRequest::user_decrypt(domain(), "0xpub", &[contract], start, days);
        DecryptionAuthorization::new(
            DecryptionKeypair {
                public_key: "0xpub".to_string(),
                private_key: Zeroizing::new("0xsecret".to_string()),
            },
            Signature(vec![1, 2, 3]),
            Address::new([2; 20]),
            &request.message,
        )
    }

    #[test]
    fn test_user_decrypt_request_shape() {
        let contract = Address::new([1; 20]);
        let request = TypedDataRequest::user_decrypt(domain(), "0xpub", &[contract], 1000, 365);
        assert_eq!(request.primary_type, USER_DECRYPT_PRIMARY_TYPE);
        assert_eq!(request.types[USER_DECRYPT_PRIMARY_TYPE].len(), 5);
        assert_eq!(request.message.contract_addresses, vec![contract]);
        assert_eq!(request.message.duration_days, 365);
    }

    #[test]
    fn test_signing_payload_is_stable() {
        let contract = Address::new([1; 20]);
        let a = TypedDataRequest::user_decrypt(domain(), "0xpub", &[contract], 1000, 365);
        let b = TypedDataRequest::user_decrypt(domain(), "0xpub", &[contract], 1000, 365);
        assert_eq!(a.signing_payload(), b.signing_payload());

        let c = TypedDataRequest::user_decrypt(domain(), "0xpub", &[contract], 1001, 365);
        assert_ne!(a.signing_payload(), c.signing_payload());
    }

    #[test]
    fn test_validity_window() {
        let auth = authorization(0, 365);
        assert_eq!(auth.expires_at(), 365 * SECONDS_PER_DAY);

        let day_364 = Utc.timestamp_opt(364 * SECONDS_PER_DAY, 0).unwrap();
        let day_365 = Utc.timestamp_opt(365 * SECONDS_PER_DAY, 0).unwrap();
        assert!(auth.is_valid_at(day_364));
        assert!(!auth.is_valid_at(day_365));
    }

    #[test]
    fn test_covers_contract() {
        let auth = authorization(0, 1);
        assert!(auth.covers(&Address::new([1; 20])));
        assert!(!auth.covers(&Address::new([3; 20])));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let auth = authorization(0, 1);
        let debug = format!("{:?}", auth);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("0xsecret"));
    }
}
