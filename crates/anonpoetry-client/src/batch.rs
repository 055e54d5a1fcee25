//! Encrypted batch builder
//!
//! Accumulates typed plaintext values for one contract and one submitter,
//! then seals them into handles plus a single proof. A builder seals at
//! most once; a failed seal leaves it open so the caller can retry.

use std::sync::Arc;

use tracing::debug;

use anonpoetry_core::{
    Address, Chunk, ComputeError, ConfidentialCompute, EncryptedBatch, EncryptedValue,
    InvalidStateError, PoetryResult,
};

/// Builds one [`EncryptedBatch`]
pub struct EncryptedBatchBuilder {
    compute: Arc<dyn ConfidentialCompute>,
    scope: Address,
    subject: Address,
    values: Vec<EncryptedValue>,
    sealed: bool,
}

impl EncryptedBatchBuilder {
    /// Open a batch bound to contract `scope` and submitter `subject`
    pub fn new(compute: Arc<dyn ConfidentialCompute>, scope: Address, subject: Address) -> Self {
        Self {
            compute,
            scope,
            subject,
            values: Vec::new(),
            sealed: false,
        }
    }

    /// Append a value
    pub fn add(&mut self, value: impl Into<EncryptedValue>) -> Result<&mut Self, InvalidStateError> {
        if self.sealed {
            return Err(InvalidStateError::AddAfterSeal);
        }
        self.values.push(value.into());
        Ok(self)
    }

    pub fn add_bool(&mut self, value: bool) -> Result<&mut Self, InvalidStateError> {
        self.add(EncryptedValue::Bool(value))
    }

    pub fn add_u8(&mut self, value: u8) -> Result<&mut Self, InvalidStateError> {
        self.add(EncryptedValue::U8(value))
    }

    pub fn add_u32(&mut self, value: u32) -> Result<&mut Self, InvalidStateError> {
        self.add(EncryptedValue::U32(value))
    }

    pub fn add_u64(&mut self, value: u64) -> Result<&mut Self, InvalidStateError> {
        self.add(EncryptedValue::U64(value))
    }

    pub fn add_u128(&mut self, value: u128) -> Result<&mut Self, InvalidStateError> {
        self.add(EncryptedValue::U128(value))
    }

    /// Append text chunks as 128-bit cells, in order
    pub fn extend_chunks(&mut self, chunks: &[Chunk]) -> Result<&mut Self, InvalidStateError> {
        if self.sealed {
            return Err(InvalidStateError::AddAfterSeal);
        }
        self.values
            .extend(chunks.iter().copied().map(EncryptedValue::chunk));
        Ok(self)
    }

    /// Encrypt everything added so far
    ///
    /// Calls the compute backend exactly once per successful seal.
    pub async fn seal(&mut self) -> PoetryResult<EncryptedBatch> {
        if self.sealed {
            return Err(InvalidStateError::AlreadySealed.into());
        }

        let batch = self
            .compute
            .encrypt_batch(&self.scope, &self.subject, &self.values)
            .await?;

        if batch.handles.len() != self.values.len() {
            return Err(ComputeError::HandleCountMismatch {
                expected: self.values.len(),
                actual: batch.handles.len(),
            }
            .into());
        }

        self.sealed = true;
        debug!(
            scope = %self.scope.short_id(),
            values = self.values.len(),
            proof_bytes = batch.input_proof.len(),
            "Sealed encrypted batch"
        );
        Ok(batch)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn scope(&self) -> Address {
        self.scope
    }

    pub fn subject(&self) -> Address {
        self.subject
    }
}
