//! Typed wrapper over the poem contract
//!
//! Encodes each contract function as a [`ContractCall`] and decodes the
//! returned [`CallValue`]s. Works against any [`Ledger`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use anonpoetry_core::{
    Address, CallArg, CallValue, ContractCall, EncryptedBatch, Handle, Ledger, LedgerError,
    TxHash, TxReceipt,
};

/// Sequential poem identifier assigned by the contract
pub type PoemId = u64;

/// Function and event names of the poem contract
pub mod abi {
    pub const PUBLISH_POEM: &str = "publishPoem";
    pub const LIKE: &str = "like";
    pub const GRANT_READ_FOR_CALLER: &str = "grantReadForCaller";
    pub const TOTAL_POEMS: &str = "totalPoems";
    pub const GET_POEM_META: &str = "getPoemMeta";
    pub const GET_TITLE_CHUNK_COUNT: &str = "getTitleChunkCount";
    pub const GET_BODY_CHUNK_COUNT: &str = "getBodyChunkCount";
    pub const GET_TITLE_CHUNK: &str = "getTitleChunk";
    pub const GET_BODY_CHUNK: &str = "getBodyChunk";
    pub const GET_LIKES: &str = "getLikes";
    pub const PROTOCOL_ID: &str = "protocolId";

    pub const EVENT_POEM_PUBLISHED: &str = "PoemPublished";
    pub const EVENT_POEM_LIKED: &str = "PoemLiked";
    pub const EVENT_READ_GRANTED: &str = "ReadGranted";
}

/// Public metadata of a poem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoemMeta {
    pub id: PoemId,
    /// Block timestamp of publication, unix seconds
    pub timestamp: i64,
}

/// Outcome of a successful publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Published {
    pub poem_id: PoemId,
    pub timestamp: i64,
    pub tx_hash: TxHash,
}

/// Which content field of a poem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Body,
}

impl Field {
    fn count_function(self) -> &'static str {
        match self {
            Field::Title => abi::GET_TITLE_CHUNK_COUNT,
            Field::Body => abi::GET_BODY_CHUNK_COUNT,
        }
    }

    fn chunk_function(self) -> &'static str {
        match self {
            Field::Title => abi::GET_TITLE_CHUNK,
            Field::Body => abi::GET_BODY_CHUNK,
        }
    }
}

fn narrow_u64(value: u128, function: &str) -> Result<u64, LedgerError> {
    u64::try_from(value).map_err(|_| LedgerError::UnexpectedReturn {
        function: function.to_string(),
        expected: "uint64".to_string(),
    })
}

fn narrow_i64(value: u128, function: &str) -> Result<i64, LedgerError> {
    i64::try_from(value).map_err(|_| LedgerError::UnexpectedReturn {
        function: function.to_string(),
        expected: "int64 timestamp".to_string(),
    })
}

/// The poem contract at one address
#[derive(Clone)]
pub struct PoemContract {
    ledger: Arc<dyn Ledger>,
    address: Address,
}

impl PoemContract {
    pub fn new(ledger: Arc<dyn Ledger>, address: Address) -> Self {
        Self { ledger, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Account that sends this contract's transactions
    pub fn sender(&self) -> Address {
        self.ledger.sender()
    }

    fn call(&self, function: &str) -> ContractCall {
        ContractCall::new(self.address, function)
    }

    /// Store a poem from its sealed title and body batches
    pub async fn publish_poem(
        &self,
        title: &EncryptedBatch,
        body: &EncryptedBatch,
    ) -> Result<Published, LedgerError> {
        let call = self
            .call(abi::PUBLISH_POEM)
            .arg(CallArg::Handles(title.handles.clone()))
            .arg(CallArg::Bytes(title.input_proof.clone()))
            .arg(CallArg::Handles(body.handles.clone()))
            .arg(CallArg::Bytes(body.input_proof.clone()));

        let receipt = self.ledger.submit_and_wait(call).await?;
        let event = receipt.require_event(abi::EVENT_POEM_PUBLISHED)?;

        let (poem_id, timestamp) = match event.args.as_slice() {
            [CallValue::Uint(id), CallValue::Uint(ts)] => (
                narrow_u64(*id, abi::EVENT_POEM_PUBLISHED)?,
                narrow_i64(*ts, abi::EVENT_POEM_PUBLISHED)?,
            ),
            _ => {
                return Err(LedgerError::UnexpectedReturn {
                    function: abi::EVENT_POEM_PUBLISHED.to_string(),
                    expected: "(poemId, timestamp)".to_string(),
                });
            }
        };

        Ok(Published {
            poem_id,
            timestamp,
            tx_hash: receipt.tx_hash,
        })
    }

    /// Add an encrypted increment (a one-value batch) to a poem's likes
    pub async fn like(&self, poem_id: PoemId, increment: &EncryptedBatch) -> Result<TxReceipt, LedgerError> {
        let [handle] = increment.handles.as_slice() else {
            return Err(LedgerError::InvalidArguments {
                function: abi::LIKE.to_string(),
                reason: format!("expected one handle, got {}", increment.handles.len()),
            });
        };

        let call = self
            .call(abi::LIKE)
            .arg(CallArg::Uint(poem_id.into()))
            .arg(CallArg::Handle(*handle))
            .arg(CallArg::Bytes(increment.input_proof.clone()));
        self.ledger.submit_and_wait(call).await
    }

    /// Grant the sender permission to decrypt a poem's handles
    pub async fn grant_read_for_caller(&self, poem_id: PoemId) -> Result<TxReceipt, LedgerError> {
        let call = self
            .call(abi::GRANT_READ_FOR_CALLER)
            .arg(CallArg::Uint(poem_id.into()));
        self.ledger.submit_and_wait(call).await
    }

    pub async fn total_poems(&self) -> Result<u64, LedgerError> {
        let value = self.ledger.read(self.call(abi::TOTAL_POEMS)).await?;
        narrow_u64(value.into_uint(abi::TOTAL_POEMS)?, abi::TOTAL_POEMS)
    }

    pub async fn poem_meta(&self, poem_id: PoemId) -> Result<PoemMeta, LedgerError> {
        let call = self
            .call(abi::GET_POEM_META)
            .arg(CallArg::Uint(poem_id.into()));
        let fields = self
            .ledger
            .read(call)
            .await?
            .into_tuple(abi::GET_POEM_META, 2)?;
        let [id, timestamp]: [CallValue; 2] =
            fields
                .try_into()
                .map_err(|_| LedgerError::UnexpectedReturn {
                    function: abi::GET_POEM_META.to_string(),
                    expected: "(id, timestamp)".to_string(),
                })?;
        let id = id.into_uint(abi::GET_POEM_META)?;
        let timestamp = timestamp.into_uint(abi::GET_POEM_META)?;

        Ok(PoemMeta {
            id: narrow_u64(id, abi::GET_POEM_META)?,
            timestamp: narrow_i64(timestamp, abi::GET_POEM_META)?,
        })
    }

    pub async fn chunk_count(&self, poem_id: PoemId, field: Field) -> Result<u64, LedgerError> {
        let function = field.count_function();
        let call = self.call(function).arg(CallArg::Uint(poem_id.into()));
        narrow_u64(self.ledger.read(call).await?.into_uint(function)?, function)
    }

    pub async fn chunk(&self, poem_id: PoemId, field: Field, index: u64) -> Result<Handle, LedgerError> {
        let function = field.chunk_function();
        let call = self
            .call(function)
            .arg(CallArg::Uint(poem_id.into()))
            .arg(CallArg::Uint(index.into()));
        self.ledger.read(call).await?.into_handle(function)
    }

    /// All chunk handles of a field, in submission order
    pub async fn chunk_handles(&self, poem_id: PoemId, field: Field) -> Result<Vec<Handle>, LedgerError> {
        let count = self.chunk_count(poem_id, field).await?;
        let mut handles = Vec::with_capacity(count as usize);
        for index in 0..count {
            handles.push(self.chunk(poem_id, field, index).await?);
        }
        Ok(handles)
    }

    pub async fn title_handles(&self, poem_id: PoemId) -> Result<Vec<Handle>, LedgerError> {
        self.chunk_handles(poem_id, Field::Title).await
    }

    pub async fn body_handles(&self, poem_id: PoemId) -> Result<Vec<Handle>, LedgerError> {
        self.chunk_handles(poem_id, Field::Body).await
    }

    /// Handle of the encrypted like counter
    pub async fn likes(&self, poem_id: PoemId) -> Result<Handle, LedgerError> {
        let call = self.call(abi::GET_LIKES).arg(CallArg::Uint(poem_id.into()));
        self.ledger.read(call).await?.into_handle(abi::GET_LIKES)
    }

    pub async fn protocol_id(&self) -> Result<u128, LedgerError> {
        self.ledger
            .read(self.call(abi::PROTOCOL_ID))
            .await?
            .into_uint(abi::PROTOCOL_ID)
    }
}
