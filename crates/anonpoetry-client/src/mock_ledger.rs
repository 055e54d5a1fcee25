//! In-memory poem contract ledger for testing
//!
//! Executes the poem contract against a [`MockConfidentialCompute`]:
//! input proofs are verified on publish and like, likes are summed
//! homomorphically, and read grants go into the backend ACL. Each
//! transaction is mined immediately into its own block stamped by the
//! [`Clock`]; reverted transactions surface from [`Ledger::wait`].
//!
//! Several users share one ledger through [`MockPoemLedger::connect`].

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use anonpoetry_core::{
    Address, CallValue, Clock, ContractCall, EncryptedBatch, EncryptedValue, Handle, Ledger,
    LedgerError, LedgerEvent, TxHash, TxReceipt,
};
use anonpoetry_crypto::MockConfidentialCompute;

use crate::contract::abi;

/// Value returned by `protocolId`
pub const PROTOCOL_ID: u128 = 1;

struct Poem {
    timestamp: i64,
    title: Vec<Handle>,
    body: Vec<Handle>,
    likes: Handle,
    readers: HashSet<Address>,
}

impl Poem {
    fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.title
            .iter()
            .chain(self.body.iter())
            .copied()
            .chain(std::iter::once(self.likes))
    }
}

struct LedgerState {
    contract: Address,
    compute: Arc<MockConfidentialCompute>,
    clock: Arc<dyn Clock>,
    poems: RwLock<Vec<Poem>>,
    receipts: DashMap<TxHash, Result<TxReceipt, LedgerError>>,
    block: AtomicU64,
    submissions: AtomicUsize,
    fail_next_submit: Mutex<Option<LedgerError>>,
}

/// One user's connection to the shared in-memory ledger
#[derive(Clone)]
pub struct MockPoemLedger {
    state: Arc<LedgerState>,
    sender: Address,
}

fn reverted(function: &str, reason: impl Into<String>) -> LedgerError {
    LedgerError::Reverted {
        function: function.to_string(),
        reason: reason.into(),
    }
}

fn timestamp_value(ts: i64) -> CallValue {
    CallValue::Uint(u128::try_from(ts).unwrap_or_default())
}

impl MockPoemLedger {
    /// Deploy an empty poem contract at `contract`, connected as `sender`
    pub fn new(
        contract: Address,
        sender: Address,
        compute: Arc<MockConfidentialCompute>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Arc::new(LedgerState {
                contract,
                compute,
                clock,
                poems: RwLock::new(Vec::new()),
                receipts: DashMap::new(),
                block: AtomicU64::new(0),
                submissions: AtomicUsize::new(0),
                fail_next_submit: Mutex::new(None),
            }),
            sender,
        }
    }

    /// Another user's connection to the same ledger
    pub fn connect(&self, sender: Address) -> Self {
        Self {
            state: Arc::clone(&self.state),
            sender,
        }
    }

    pub fn contract(&self) -> Address {
        self.state.contract
    }

    /// Transactions submitted by all connections
    pub fn submissions(&self) -> usize {
        self.state.submissions.load(Ordering::SeqCst)
    }

    /// Reject the next submission before it reaches a block
    pub fn fail_next_submit(&self, err: LedgerError) {
        *self.state.fail_next_submit.lock() = Some(err);
    }

    fn poem_index(&self, function: &str, id: u128) -> Result<usize, LedgerError> {
        let len = self.state.poems.read().len();
        usize::try_from(id)
            .ok()
            .filter(|&index| index < len)
            .ok_or_else(|| reverted(function, format!("poem {} does not exist", id)))
    }

    fn verify(&self, function: &str, handles: &[Handle], proof: &[u8]) -> Result<(), LedgerError> {
        let batch = EncryptedBatch {
            handles: handles.to_vec(),
            input_proof: proof.to_vec(),
        };
        self.state
            .compute
            .verify_input(&batch, &self.state.contract, &self.sender)
            .map_err(|e| reverted(function, e.to_string()))
    }

    fn execute(&self, call: &ContractCall, timestamp: i64) -> Result<Vec<LedgerEvent>, LedgerError> {
        let function = call.function.as_str();
        let contract = self.state.contract;
        let compute = &self.state.compute;

        match function {
            abi::PUBLISH_POEM => {
                let title = call.handles_arg(0)?;
                let title_proof = call.bytes_arg(1)?;
                let body = call.handles_arg(2)?;
                let body_proof = call.bytes_arg(3)?;
                self.verify(function, title, title_proof)?;
                self.verify(function, body, body_proof)?;

                let likes = compute
                    .trivial_encrypt(EncryptedValue::U32(0), contract)
                    .map_err(|e| reverted(function, e.to_string()))?;

                let mut poems = self.state.poems.write();
                let id = poems.len() as u128;
                poems.push(Poem {
                    timestamp,
                    title: title.to_vec(),
                    body: body.to_vec(),
                    likes,
                    readers: HashSet::new(),
                });

                Ok(vec![LedgerEvent {
                    name: abi::EVENT_POEM_PUBLISHED.to_string(),
                    args: vec![CallValue::Uint(id), timestamp_value(timestamp)],
                }])
            }
            abi::LIKE => {
                let id = call.uint_arg(0)?;
                let increment = call.handle_arg(1)?;
                let proof = call.bytes_arg(2)?;
                let index = self.poem_index(function, id)?;
                self.verify(function, &[increment], proof)?;

                let mut poems = self.state.poems.write();
                let poem = &mut poems[index];
                let likes = compute
                    .add(&poem.likes, &increment, contract)
                    .map_err(|e| reverted(function, e.to_string()))?;
                for reader in &poem.readers {
                    compute.allow(likes, *reader);
                }
                poem.likes = likes;

                Ok(vec![LedgerEvent {
                    name: abi::EVENT_POEM_LIKED.to_string(),
                    args: vec![CallValue::Uint(id)],
                }])
            }
            abi::GRANT_READ_FOR_CALLER => {
                let id = call.uint_arg(0)?;
                let index = self.poem_index(function, id)?;

                let mut poems = self.state.poems.write();
                let poem = &mut poems[index];
                for handle in poem.handles() {
                    compute.allow(handle, self.sender);
                }
                poem.readers.insert(self.sender);

                Ok(vec![LedgerEvent {
                    name: abi::EVENT_READ_GRANTED.to_string(),
                    args: vec![CallValue::Uint(id), CallValue::Address(self.sender)],
                }])
            }
            other => Err(LedgerError::UnknownFunction(other.to_string())),
        }
    }

    fn tx_hash(&self, block: u64, call: &ContractCall) -> TxHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&block.to_be_bytes());
        hasher.update(self.sender.as_bytes());
        hasher.update(call.function.as_bytes());
        TxHash::new(*hasher.finalize().as_bytes())
    }
}

#[async_trait]
impl Ledger for MockPoemLedger {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn submit(&self, call: ContractCall) -> Result<TxHash, LedgerError> {
        if let Some(err) = self.state.fail_next_submit.lock().take() {
            return Err(err);
        }
        if call.contract != self.state.contract {
            return Err(LedgerError::SubmitFailed(format!(
                "no contract deployed at {}",
                call.contract
            )));
        }

        self.state.submissions.fetch_add(1, Ordering::SeqCst);
        let block = self.state.block.fetch_add(1, Ordering::SeqCst) + 1;
        let timestamp = self.state.clock.now_utc().timestamp();
        let tx_hash = self.tx_hash(block, &call);

        let outcome = self.execute(&call, timestamp).map(|events| TxReceipt {
            tx_hash,
            block_number: block,
            timestamp,
            events,
        });

        debug!(
            function = %call.function,
            sender = %self.sender.short_id(),
            block,
            ok = outcome.is_ok(),
            "Mined transaction"
        );
        self.state.receipts.insert(tx_hash, outcome);
        Ok(tx_hash)
    }

    async fn wait(&self, tx: &TxHash) -> Result<TxReceipt, LedgerError> {
        self.state
            .receipts
            .get(tx)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| Err(LedgerError::TransactionNotFound(tx.to_string())))
    }

    async fn read(&self, call: ContractCall) -> Result<CallValue, LedgerError> {
        if call.contract != self.state.contract {
            return Err(LedgerError::ReadFailed(format!(
                "no contract deployed at {}",
                call.contract
            )));
        }

        let function = call.function.as_str();
        match function {
            abi::TOTAL_POEMS => Ok(CallValue::Uint(self.state.poems.read().len() as u128)),
            abi::PROTOCOL_ID => Ok(CallValue::Uint(PROTOCOL_ID)),
            abi::GET_POEM_META
            | abi::GET_TITLE_CHUNK_COUNT
            | abi::GET_BODY_CHUNK_COUNT
            | abi::GET_TITLE_CHUNK
            | abi::GET_BODY_CHUNK
            | abi::GET_LIKES => {
                let id = call.uint_arg(0)?;
                let index = self.poem_index(function, id)?;
                let poems = self.state.poems.read();
                let poem = &poems[index];

                let chunk_at = |chunks: &[Handle]| -> Result<CallValue, LedgerError> {
                    let i = call.uint_arg(1)?;
                    usize::try_from(i)
                        .ok()
                        .and_then(|i| chunks.get(i))
                        .map(|h| CallValue::Handle(*h))
                        .ok_or_else(|| reverted(function, format!("chunk index {} out of range", i)))
                };

                match function {
                    abi::GET_POEM_META => Ok(CallValue::Tuple(vec![
                        CallValue::Uint(id),
                        timestamp_value(poem.timestamp),
                    ])),
                    abi::GET_TITLE_CHUNK_COUNT => Ok(CallValue::Uint(poem.title.len() as u128)),
                    abi::GET_BODY_CHUNK_COUNT => Ok(CallValue::Uint(poem.body.len() as u128)),
                    abi::GET_TITLE_CHUNK => chunk_at(&poem.title),
                    abi::GET_BODY_CHUNK => chunk_at(&poem.body),
                    _ => Ok(CallValue::Handle(poem.likes)),
                }
            }
            other => Err(LedgerError::UnknownFunction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anonpoetry_core::{CallArg, ManualClock};

    const CONTRACT: Address = Address::new([0xcc; 20]);
    const ALICE: Address = Address::new([0xa1; 20]);
    const BOB: Address = Address::new([0xb0; 20]);

    fn ledger() -> (Arc<MockConfidentialCompute>, MockPoemLedger) {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let compute = Arc::new(MockConfidentialCompute::new(clock.clone()));
        let ledger = MockPoemLedger::new(CONTRACT, ALICE, compute.clone(), clock);
        (compute, ledger)
    }

    async fn publish(compute: &MockConfidentialCompute, ledger: &MockPoemLedger) -> TxReceipt {
        use anonpoetry_core::ConfidentialCompute;
        let title = compute
            .encrypt_batch(&CONTRACT, &ledger.sender(), &[1u128.into()])
            .await
            .unwrap();
        let body = compute
            .encrypt_batch(&CONTRACT, &ledger.sender(), &[2u128.into(), 3u128.into()])
            .await
            .unwrap();
        let call = ContractCall::new(CONTRACT, abi::PUBLISH_POEM)
            .arg(CallArg::Handles(title.handles))
            .arg(CallArg::Bytes(title.input_proof))
            .arg(CallArg::Handles(body.handles))
            .arg(CallArg::Bytes(body.input_proof));
        ledger.submit_and_wait(call).await.unwrap()
    }

    #[tokio::test]
    async fn test_publish_emits_event_and_counts() {
        let (compute, ledger) = ledger();
        let receipt = publish(&compute, &ledger).await;

        let event = receipt.event(abi::EVENT_POEM_PUBLISHED).unwrap();
        assert_eq!(event.args[0], CallValue::Uint(0));
        assert_eq!(receipt.timestamp, 1_700_000_000);

        let total = ledger
            .read(ContractCall::new(CONTRACT, abi::TOTAL_POEMS))
            .await
            .unwrap();
        assert_eq!(total, CallValue::Uint(1));

        let count = ledger
            .read(ContractCall::new(CONTRACT, abi::GET_BODY_CHUNK_COUNT).arg(CallArg::Uint(0)))
            .await
            .unwrap();
        assert_eq!(count, CallValue::Uint(2));
    }

    #[tokio::test]
    async fn test_publish_with_foreign_proof_reverts() {
        let (compute, ledger) = ledger();
        let bob = ledger.connect(BOB);
        use anonpoetry_core::ConfidentialCompute;

        // Alice's batch submitted from Bob's account
        let batch = compute
            .encrypt_batch(&CONTRACT, &ALICE, &[1u128.into()])
            .await
            .unwrap();
        let call = ContractCall::new(CONTRACT, abi::PUBLISH_POEM)
            .arg(CallArg::Handles(batch.handles.clone()))
            .arg(CallArg::Bytes(batch.input_proof.clone()))
            .arg(CallArg::Handles(batch.handles))
            .arg(CallArg::Bytes(batch.input_proof));

        let result = bob.submit_and_wait(call).await;
        assert!(matches!(result, Err(LedgerError::Reverted { .. })));
    }

    #[tokio::test]
    async fn test_unknown_poem_and_chunk_index() {
        let (compute, ledger) = ledger();
        publish(&compute, &ledger).await;

        let missing = ledger
            .read(ContractCall::new(CONTRACT, abi::GET_LIKES).arg(CallArg::Uint(9)))
            .await;
        assert!(matches!(missing, Err(LedgerError::Reverted { .. })));

        let out_of_range = ledger
            .read(
                ContractCall::new(CONTRACT, abi::GET_TITLE_CHUNK)
                    .arg(CallArg::Uint(0))
                    .arg(CallArg::Uint(5)),
            )
            .await;
        assert!(matches!(out_of_range, Err(LedgerError::Reverted { .. })));
    }

    #[tokio::test]
    async fn test_grant_read_updates_acl() {
        let (compute, ledger) = ledger();
        publish(&compute, &ledger).await;

        let likes = ledger
            .read(ContractCall::new(CONTRACT, abi::GET_LIKES).arg(CallArg::Uint(0)))
            .await
            .unwrap()
            .into_handle(abi::GET_LIKES)
            .unwrap();
        assert!(!compute.is_allowed(&likes, &BOB));

        let bob = ledger.connect(BOB);
        let receipt = bob
            .submit_and_wait(
                ContractCall::new(CONTRACT, abi::GRANT_READ_FOR_CALLER).arg(CallArg::Uint(0)),
            )
            .await
            .unwrap();
        let event = receipt.event(abi::EVENT_READ_GRANTED).unwrap();
        assert_eq!(event.args[1], CallValue::Address(BOB));
        assert!(compute.is_allowed(&likes, &BOB));
    }

    #[tokio::test]
    async fn test_unknown_function_and_contract() {
        let (_, ledger) = ledger();
        let result = ledger
            .submit_and_wait(ContractCall::new(CONTRACT, "selfDestruct"))
            .await;
        assert!(matches!(result, Err(LedgerError::UnknownFunction(_))));

        let result = ledger
            .submit(ContractCall::new(Address::new([1; 20]), abi::LIKE))
            .await;
        assert!(matches!(result, Err(LedgerError::SubmitFailed(_))));

        let result = ledger.wait(&TxHash::new([0; 32])).await;
        assert!(matches!(result, Err(LedgerError::TransactionNotFound(_))));
    }

    #[tokio::test]
    async fn test_protocol_id_and_fault_hook() {
        let (_, ledger) = ledger();
        let id = ledger
            .read(ContractCall::new(CONTRACT, abi::PROTOCOL_ID))
            .await
            .unwrap();
        assert_eq!(id, CallValue::Uint(PROTOCOL_ID));

        ledger.fail_next_submit(LedgerError::SubmitFailed("nonce too low".to_string()));
        let result = ledger
            .submit(ContractCall::new(CONTRACT, abi::GRANT_READ_FOR_CALLER))
            .await;
        assert!(matches!(result, Err(LedgerError::SubmitFailed(_))));
        assert_eq!(ledger.submissions(), 0);
    }
}
