//! Batch decryptor
//!
//! One call, one round trip: every requested handle comes back or the call
//! fails. Partial results are never returned.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use anonpoetry_core::{
    Address, Clock, ConfidentialCompute, DecryptionAuthorization, DecryptionError, Handle,
    HandleContractPair, HandleValueMap,
};

/// Decrypts handles belonging to one contract
pub struct BatchDecryptor {
    compute: Arc<dyn ConfidentialCompute>,
    clock: Arc<dyn Clock>,
    contract: Address,
}

impl BatchDecryptor {
    pub fn new(compute: Arc<dyn ConfidentialCompute>, clock: Arc<dyn Clock>, contract: Address) -> Self {
        Self {
            compute,
            clock,
            contract,
        }
    }

    /// Decrypt all `handles` under `authorization`
    ///
    /// The authorization is rechecked against the clock immediately before
    /// the request; an expired one is rejected without calling the backend.
    /// Duplicate handles are requested once.
    pub async fn decrypt_many(
        &self,
        handles: &[Handle],
        authorization: &DecryptionAuthorization,
    ) -> Result<HandleValueMap, DecryptionError> {
        if handles.is_empty() {
            return Err(DecryptionError::EmptyRequest);
        }

        let now = self.clock.now_utc();
        if !authorization.is_valid_at(now) {
            return Err(DecryptionError::AuthorizationExpired {
                expired_at: authorization.expires_at(),
                now: now.timestamp(),
            });
        }

        let mut seen = HashSet::with_capacity(handles.len());
        let requests: Vec<HandleContractPair> = handles
            .iter()
            .filter(|handle| seen.insert(**handle))
            .map(|&handle| HandleContractPair {
                handle,
                contract_address: self.contract,
            })
            .collect();

        let mut values = self.compute.user_decrypt(&requests, authorization).await?;
        let returned = values.len();

        if let Some(missing) = requests.iter().find(|r| !values.contains_key(&r.handle)) {
            return Err(DecryptionError::Incomplete {
                missing: missing.handle,
                requested: requests.len(),
                returned,
            });
        }

        values.retain(|handle, _| seen.contains(handle));

        debug!(
            contract = %self.contract.short_id(),
            handles = requests.len(),
            "Decrypted handle batch"
        );
        Ok(values)
    }
}
