//! In-memory confidential-compute backend for testing
//!
//! Ciphertext cells are kept encrypted under a private [`StoreKey`] and
//! addressed by random 32-byte handles. Input proofs are BLAKE3 digests
//! binding the handles to their contract and submitter. User decryption
//! verifies the signed authorization, checks the ACL, re-encrypts each value
//! to the authorization's public key and opens it with the private key, the
//! same path a real relayer and SDK take.
//!
//! Fault hooks let tests force encryption or decryption failures, drop
//! handles from responses, or return a short batch.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use rand::RngCore;
use tracing::debug;

use anonpoetry_core::{
    Address, ClearValue, Clock, ComputeError, ConfidentialCompute, DecryptionAuthorization,
    DecryptionKeypair, EncryptedBatch, EncryptedValue, Handle, HandleContractPair, HandleValueMap,
    TypedDataRequest, ValueKind,
};

use crate::eip712::DecryptionDomain;
use crate::keys::{
    EncryptedData, StoreKey, generate_decryption_keypair, open_sealed, parse_public_key,
    parse_secret, seal_for,
};
use crate::signer::verify_typed_data;

const PROOF_CONTEXT: &str = "anonpoetry mock input proof v1";

struct Cell {
    sealed: EncryptedData,
    kind: ValueKind,
    contract: Address,
}

/// Mock confidential-compute backend
pub struct MockConfidentialCompute {
    store_key: StoreKey,
    cells: DashMap<Handle, Cell>,
    acl: DashMap<Handle, HashSet<Address>>,
    domain: DecryptionDomain,
    clock: Arc<dyn Clock>,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
    dropped: DashSet<Handle>,
    short_next_batch: AtomicBool,
    fail_next_encrypt: Mutex<Option<ComputeError>>,
    fail_next_decrypt: Mutex<Option<ComputeError>>,
}

impl MockConfidentialCompute {
    /// Create a backend with the default decryption domain
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_domain(clock, DecryptionDomain::default())
    }

    pub fn with_domain(clock: Arc<dyn Clock>, domain: DecryptionDomain) -> Self {
        Self {
            store_key: StoreKey::generate(),
            cells: DashMap::new(),
            acl: DashMap::new(),
            domain,
            clock,
            encrypt_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
            dropped: DashSet::new(),
            short_next_batch: AtomicBool::new(false),
            fail_next_encrypt: Mutex::new(None),
            fail_next_decrypt: Mutex::new(None),
        }
    }

    fn random_handle() -> Handle {
        let mut bytes = [0u8; Handle::LEN];
        rand::rng().fill_bytes(&mut bytes);
        Handle::new(bytes)
    }

    fn store(&self, value: ClearValue, kind: ValueKind, contract: Address) -> Result<Handle, ComputeError> {
        let sealed = self.store_key.encrypt(&value.to_be_bytes())?;
        let handle = Self::random_handle();
        self.cells.insert(
            handle,
            Cell {
                sealed,
                kind,
                contract,
            },
        );
        self.allow(handle, contract);
        Ok(handle)
    }

    fn load(&self, handle: &Handle) -> Result<(ClearValue, ValueKind), ComputeError> {
        let cell = self
            .cells
            .get(handle)
            .ok_or(ComputeError::UnknownHandle(*handle))?;
        let bytes = self.store_key.decrypt(&cell.sealed)?;
        let raw: [u8; 16] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ComputeError::DecryptionFailed("corrupt cell".to_string()))?;
        Ok((ClearValue::from_be_bytes(raw), cell.kind))
    }

    fn input_proof(scope: &Address, subject: &Address, handles: &[Handle]) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new_derive_key(PROOF_CONTEXT);
        hasher.update(scope.as_bytes());
        hasher.update(subject.as_bytes());
        for handle in handles {
            hasher.update(handle.as_bytes());
        }
        hasher.finalize().as_bytes().to_vec()
    }

    /// Check that `batch` was encrypted for `scope` by `subject`
    pub fn verify_input(
        &self,
        batch: &EncryptedBatch,
        scope: &Address,
        subject: &Address,
    ) -> Result<(), ComputeError> {
        if Self::input_proof(scope, subject, &batch.handles) != batch.input_proof {
            return Err(ComputeError::EncryptionFailed(
                "input proof does not match scope and subject".to_string(),
            ));
        }
        for handle in &batch.handles {
            if !self.cells.contains_key(handle) {
                return Err(ComputeError::UnknownHandle(*handle));
            }
        }
        Ok(())
    }

    /// Grant `address` permission to use `handle`
    pub fn allow(&self, handle: Handle, address: Address) {
        self.acl.entry(handle).or_default().insert(address);
    }

    pub fn is_allowed(&self, handle: &Handle, address: &Address) -> bool {
        self.acl
            .get(handle)
            .is_some_and(|allowed| allowed.contains(address))
    }

    /// Encrypt a constant directly, owned by `contract`
    pub fn trivial_encrypt(&self, value: EncryptedValue, contract: Address) -> Result<Handle, ComputeError> {
        self.store(value.as_u128(), value.kind(), contract)
    }

    /// Homomorphic addition, wrapping at the cell width of `lhs`
    ///
    /// The result is a new handle owned by `contract`.
    pub fn add(&self, lhs: &Handle, rhs: &Handle, contract: Address) -> Result<Handle, ComputeError> {
        let (a, kind) = self.load(lhs)?;
        let (b, _) = self.load(rhs)?;
        let sum = match kind.bits() {
            128 => a.wrapping_add(b),
            bits => a.wrapping_add(b) & ((1u128 << bits) - 1),
        };
        self.store(sum, kind, contract)
    }

    /// Omit `handle` from every later decryption response
    pub fn drop_from_responses(&self, handle: Handle) {
        self.dropped.insert(handle);
    }

    /// Make the next `encrypt_batch` return one handle fewer than requested
    pub fn short_next_batch(&self) {
        self.short_next_batch.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_encrypt(&self, err: ComputeError) {
        *self.fail_next_encrypt.lock() = Some(err);
    }

    pub fn fail_next_decrypt(&self, err: ComputeError) {
        *self.fail_next_decrypt.lock() = Some(err);
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    /// Number of stored ciphertext cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn verify_authorization(&self, auth: &DecryptionAuthorization) -> Result<(), ComputeError> {
        if !auth.is_valid_at(self.clock.now_utc()) {
            return Err(ComputeError::AuthorizationRejected(format!(
                "authorization expired at {}",
                auth.expires_at()
            )));
        }

        let request = self.create_eip712(
            &auth.public_key,
            &auth.contract_addresses,
            auth.start_timestamp,
            auth.duration_days,
        );
        let signer = verify_typed_data(&request, &auth.signature)?;
        if signer != auth.user_address {
            return Err(ComputeError::AuthorizationRejected(format!(
                "signed by {} on behalf of {}",
                signer, auth.user_address
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfidentialCompute for MockConfidentialCompute {
    async fn encrypt_batch(
        &self,
        scope: &Address,
        subject: &Address,
        values: &[EncryptedValue],
    ) -> Result<EncryptedBatch, ComputeError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_next_encrypt.lock().take() {
            return Err(err);
        }

        let mut handles = values
            .iter()
            .map(|value| self.store(value.as_u128(), value.kind(), *scope))
            .collect::<Result<Vec<_>, _>>()?;

        let input_proof = Self::input_proof(scope, subject, &handles);

        if self.short_next_batch.swap(false, Ordering::SeqCst) {
            handles.pop();
        }

        debug!(
            scope = %scope.short_id(),
            subject = %subject.short_id(),
            values = values.len(),
            "Encrypted input batch"
        );
        Ok(EncryptedBatch {
            handles,
            input_proof,
        })
    }

    fn generate_keypair(&self) -> Result<DecryptionKeypair, ComputeError> {
        Ok(generate_decryption_keypair())
    }

    fn create_eip712(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: i64,
        duration_days: u32,
    ) -> TypedDataRequest {
        self.domain
            .user_decrypt_request(public_key, contract_addresses, start_timestamp, duration_days)
    }

    async fn user_decrypt(
        &self,
        requests: &[HandleContractPair],
        authorization: &DecryptionAuthorization,
    ) -> Result<HandleValueMap, ComputeError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_next_decrypt.lock().take() {
            return Err(err);
        }

        self.verify_authorization(authorization)?;

        // Relayer side re-encrypts to the public key; SDK side opens with the private key
        let recipient = parse_public_key(&authorization.public_key)?;
        let secret = parse_secret(&authorization.private_key)?;
        let user = authorization.user_address;

        let mut values = HandleValueMap::with_capacity(requests.len());
        for pair in requests {
            if !authorization.covers(&pair.contract_address) {
                return Err(ComputeError::AuthorizationRejected(format!(
                    "contract {} not covered",
                    pair.contract_address
                )));
            }
            if !self.is_allowed(&pair.handle, &user) || !self.is_allowed(&pair.handle, &pair.contract_address) {
                return Err(ComputeError::AccessDenied {
                    handle: pair.handle,
                    user,
                });
            }
            if self.dropped.contains(&pair.handle) {
                continue;
            }

            let (value, _) = self.load(&pair.handle)?;
            let sealed = seal_for(&recipient, &value.to_be_bytes())?;
            let opened = open_sealed(&sealed, &secret)?;
            let raw: [u8; 16] = opened
                .as_slice()
                .try_into()
                .map_err(|_| ComputeError::DecryptionFailed("bad plaintext length".to_string()))?;
            values.insert(pair.handle, ClearValue::from_be_bytes(raw));
        }

        debug!(
            user = %user.short_id(),
            requested = requests.len(),
            returned = values.len(),
            "User decryption"
        );
        Ok(values)
    }
}
