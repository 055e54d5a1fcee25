//! Fixed-width byte identifiers
//!
//! - [`Address`]: 20-byte account or contract address
//! - [`Handle`]: 32-byte opaque reference to an encrypted value
//! - [`TxHash`]: 32-byte transaction hash
//!
//! All three display as `0x`-prefixed lowercase hex, parse with or without
//! the prefix, and serialize as hex strings.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

macro_rules! hex_identifier {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Length in bytes
            pub const LEN: usize = $len;

            /// Create from raw bytes
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Get the underlying bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Create from a byte slice of exactly the right length
            pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentifierParseError> {
                let arr: [u8; $len] =
                    bytes
                        .try_into()
                        .map_err(|_| IdentifierParseError::InvalidLength {
                            expected: $len,
                            actual: bytes.len(),
                        })?;
                Ok(Self(arr))
            }

            /// Short display form (for logging)
            pub fn short_id(&self) -> String {
                format!("0x{}", hex::encode(&self.0[..4]))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = IdentifierParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let stripped = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                let bytes = hex::decode(stripped)
                    .map_err(|e| IdentifierParseError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_identifier!(
    /// Account or contract address
    Address,
    20
);

hex_identifier!(
    /// Opaque reference to one encrypted value held by the compute backend
    Handle,
    32
);

hex_identifier!(
    /// Transaction hash returned by the ledger on submission
    TxHash,
    32
);

/// Errors parsing a hex identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierParseError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

impl From<IdentifierParseError> for LedgerError {
    fn from(e: IdentifierParseError) -> Self {
        LedgerError::ReadFailed(e.to_string())
    }
}
