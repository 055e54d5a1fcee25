//! Plaintext values, encrypted batches, and decrypted results

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::Chunk;
use crate::identity::{Address, Handle};

/// A decrypted plaintext value
///
/// Every supported cell width fits in a `u128`; booleans decrypt to 0 or 1.
pub type ClearValue = u128;

/// Result of one bulk decryption: handle to recovered value
pub type HandleValueMap = HashMap<Handle, ClearValue>;

/// Encrypted cell type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    U8,
    U32,
    U64,
    U128,
}

impl ValueKind {
    /// Width of the cell in bits
    pub fn bits(&self) -> u32 {
        match self {
            ValueKind::Bool => 1,
            ValueKind::U8 => 8,
            ValueKind::U32 => 32,
            ValueKind::U64 => 64,
            ValueKind::U128 => 128,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "ebool"),
            ValueKind::U8 => write!(f, "euint8"),
            ValueKind::U32 => write!(f, "euint32"),
            ValueKind::U64 => write!(f, "euint64"),
            ValueKind::U128 => write!(f, "euint128"),
        }
    }
}

/// A typed plaintext value queued for encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum EncryptedValue {
    Bool(bool),
    U8(u8),
    U32(u32),
    U64(u64),
    U128(u128),
}

impl EncryptedValue {
    /// The cell type this value encrypts into
    pub fn kind(&self) -> ValueKind {
        match self {
            EncryptedValue::Bool(_) => ValueKind::Bool,
            EncryptedValue::U8(_) => ValueKind::U8,
            EncryptedValue::U32(_) => ValueKind::U32,
            EncryptedValue::U64(_) => ValueKind::U64,
            EncryptedValue::U128(_) => ValueKind::U128,
        }
    }

    /// Widen to the common plaintext representation
    pub fn as_u128(&self) -> ClearValue {
        match *self {
            EncryptedValue::Bool(b) => b as u128,
            EncryptedValue::U8(v) => v as u128,
            EncryptedValue::U32(v) => v as u128,
            EncryptedValue::U64(v) => v as u128,
            EncryptedValue::U128(v) => v,
        }
    }

    /// A text chunk
    pub fn chunk(chunk: Chunk) -> Self {
        EncryptedValue::U128(chunk)
    }
}

impl From<bool> for EncryptedValue {
    fn from(v: bool) -> Self {
        EncryptedValue::Bool(v)
    }
}

impl From<u8> for EncryptedValue {
    fn from(v: u8) -> Self {
        EncryptedValue::U8(v)
    }
}

impl From<u32> for EncryptedValue {
    fn from(v: u32) -> Self {
        EncryptedValue::U32(v)
    }
}

impl From<u64> for EncryptedValue {
    fn from(v: u64) -> Self {
        EncryptedValue::U64(v)
    }
}

impl From<u128> for EncryptedValue {
    fn from(v: u128) -> Self {
        EncryptedValue::U128(v)
    }
}

/// Ciphertext bundle produced by sealing one batch
///
/// One handle per submitted value, in submission order, and a single proof
/// covering all of them. Consumed by exactly one ledger submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBatch {
    /// Handles in submission order
    pub handles: Vec<Handle>,
    /// Proof binding the handles to their scope and subject
    #[serde(with = "hex_bytes")]
    pub input_proof: Vec<u8>,
}

impl EncryptedBatch {
    /// Number of encrypted values in the batch
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the batch carries no values
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// One entry of a bulk decryption request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleContractPair {
    pub handle: Handle,
    pub contract_address: Address,
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
