//! Collaborator traits for AnonPoetry
//!
//! The core never talks to a wallet, a chain, or a compute backend
//! directly. These traits are the seams; the crates above provide
//! in-memory implementations for tests and demos.
//!
//! ## Key Traits
//!
//! - [`ConfidentialCompute`]: Batch encryption and bulk user decryption
//! - [`Signer`]: Structured message signing (the user's wallet)
//! - [`Ledger`]: Transaction submission and view reads
//! - [`Clock`]: Time abstraction for testability

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::authorization::{
    DecryptionAuthorization, DecryptionKeypair, Signature, TypedDataRequest,
};
use crate::error::{ComputeError, LedgerError, SignerError};
use crate::identity::{Address, TxHash};
use crate::ledger::{CallValue, ContractCall, TxReceipt};
use crate::value::{EncryptedBatch, EncryptedValue, HandleContractPair, HandleValueMap};

/// Confidential-compute backend
///
/// Turns plaintext batches into handles plus one proof, and decrypts
/// handles for a user holding a signed authorization.
#[async_trait]
pub trait ConfidentialCompute: Send + Sync {
    /// Encrypt `values` for contract `scope` on behalf of `subject`
    ///
    /// Must return exactly one handle per value, in order.
    async fn encrypt_batch(
        &self,
        scope: &Address,
        subject: &Address,
        values: &[EncryptedValue],
    ) -> Result<EncryptedBatch, ComputeError>;

    /// Generate an ephemeral keypair for receiving decrypted values
    fn generate_keypair(&self) -> Result<DecryptionKeypair, ComputeError>;

    /// Build the structured request a user signs to authorize decryption
    fn create_eip712(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: i64,
        duration_days: u32,
    ) -> TypedDataRequest;

    /// Decrypt all requested handles in one round trip
    async fn user_decrypt(
        &self,
        requests: &[HandleContractPair],
        authorization: &DecryptionAuthorization,
    ) -> Result<HandleValueMap, ComputeError>;
}

/// Structured message signer (the user's wallet)
#[async_trait]
pub trait Signer: Send + Sync {
    /// Address whose key produces signatures
    fn address(&self) -> Address;

    /// Sign a structured request; may wait for user approval
    async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Signature, SignerError>;
}

/// Ledger client
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Account that submits transactions and is `msg.sender` in calls
    fn sender(&self) -> Address;

    /// Submit a state-changing call
    async fn submit(&self, call: ContractCall) -> Result<TxHash, LedgerError>;

    /// Wait until the transaction is included (or fails)
    async fn wait(&self, tx: &TxHash) -> Result<TxReceipt, LedgerError>;

    /// Evaluate a view function
    async fn read(&self, call: ContractCall) -> Result<CallValue, LedgerError>;

    /// Submit and wait for inclusion
    async fn submit_and_wait(&self, call: ContractCall) -> Result<TxReceipt, LedgerError> {
        let tx = self.submit(call).await?;
        self.wait(&tx).await
    }
}

#[async_trait]
impl<T: ConfidentialCompute + ?Sized> ConfidentialCompute for Arc<T> {
    async fn encrypt_batch(
        &self,
        scope: &Address,
        subject: &Address,
        values: &[EncryptedValue],
    ) -> Result<EncryptedBatch, ComputeError> {
        (**self).encrypt_batch(scope, subject, values).await
    }

    fn generate_keypair(&self) -> Result<DecryptionKeypair, ComputeError> {
        (**self).generate_keypair()
    }

    fn create_eip712(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: i64,
        duration_days: u32,
    ) -> TypedDataRequest {
        (**self).create_eip712(public_key, contract_addresses, start_timestamp, duration_days)
    }

    async fn user_decrypt(
        &self,
        requests: &[HandleContractPair],
        authorization: &DecryptionAuthorization,
    ) -> Result<HandleValueMap, ComputeError> {
        (**self).user_decrypt(requests, authorization).await
    }
}

#[async_trait]
impl<T: Signer + ?Sized> Signer for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Signature, SignerError> {
        (**self).sign_typed_data(request).await
    }
}

#[async_trait]
impl<T: Ledger + ?Sized> Ledger for Arc<T> {
    fn sender(&self) -> Address {
        (**self).sender()
    }

    async fn submit(&self, call: ContractCall) -> Result<TxHash, LedgerError> {
        (**self).submit(call).await
    }

    async fn wait(&self, tx: &TxHash) -> Result<TxReceipt, LedgerError> {
        (**self).wait(tx).await
    }

    async fn read(&self, call: ContractCall) -> Result<CallValue, LedgerError> {
        (**self).read(call).await
    }
}

/// Time abstraction for testability
///
/// This trait allows tests to control time, enabling deterministic
/// testing of authorization expiry.
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Create a clock frozen at a unix timestamp (seconds)
    pub fn at_unix(seconds: i64) -> Self {
        Self::new(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }

    /// Jump to a specific instant
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_unix(1_000);
        assert_eq!(clock.now_utc().timestamp(), 1_000);

        clock.advance(Duration::days(2));
        assert_eq!(clock.now_utc().timestamp(), 1_000 + 2 * 86_400);

        clock.set(DateTime::from_timestamp(5, 0).unwrap());
        assert_eq!(clock.now_utc().timestamp(), 5);
    }

    #[test]
    fn test_arc_clock_delegates() {
        let clock = Arc::new(ManualClock::at_unix(42));
        let shared: Arc<dyn Clock> = clock.clone();
        assert_eq!(shared.now_utc().timestamp(), 42);
        clock.advance(Duration::seconds(1));
        assert_eq!(shared.now_utc().timestamp(), 43);
    }

    /// Mines every call into a receipt carrying one event named after it
    struct EchoLedger {
        submitted: RwLock<Vec<String>>,
    }

    #[async_trait]
    impl Ledger for EchoLedger {
        fn sender(&self) -> Address {
            Address::new([7; 20])
        }

        async fn submit(&self, call: ContractCall) -> Result<TxHash, LedgerError> {
            let mut submitted = self.submitted.write();
            submitted.push(call.function);
            Ok(TxHash::new([submitted.len() as u8; 32]))
        }

        async fn wait(&self, tx: &TxHash) -> Result<TxReceipt, LedgerError> {
            let index = tx.as_bytes()[0] as usize - 1;
            let name = self
                .submitted
                .read()
                .get(index)
                .cloned()
                .ok_or_else(|| LedgerError::TransactionNotFound(tx.to_string()))?;
            Ok(TxReceipt {
                tx_hash: *tx,
                block_number: index as u64 + 1,
                timestamp: 0,
                events: vec![crate::ledger::LedgerEvent { name, args: vec![] }],
            })
        }

        async fn read(&self, call: ContractCall) -> Result<CallValue, LedgerError> {
            Err(LedgerError::UnknownFunction(call.function))
        }
    }

    #[test]
    fn test_submit_and_wait_through_arc() {
        let ledger = Arc::new(EchoLedger {
            submitted: RwLock::new(Vec::new()),
        });
        let shared: Arc<dyn Ledger> = ledger.clone();
        let contract = Address::new([1; 20]);

        let receipt = tokio_test::block_on(
            shared.submit_and_wait(ContractCall::new(contract, "grantReadForCaller")),
        )
        .unwrap();
        assert_eq!(receipt.block_number, 1);
        assert!(receipt.event("grantReadForCaller").is_some());
        assert_eq!(shared.sender(), Address::new([7; 20]));

        let missing = tokio_test::block_on(shared.wait(&TxHash::new([9; 32])));
        assert!(matches!(missing, Err(LedgerError::TransactionNotFound(_))));
    }

    #[test]
    fn test_system_clock_is_recent() {
        let now = SystemClock.now_utc();
        assert!(now.timestamp() > 1_600_000_000);
    }
}
