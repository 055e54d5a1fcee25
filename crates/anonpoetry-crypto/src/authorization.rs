//! Decryption authorization manager
//!
//! Holds at most one signed authorization per session. The first
//! [`AuthorizationManager::ensure`] generates an ephemeral keypair, has the
//! user sign a request covering the configured contracts, and caches the
//! result. Later calls return the cached authorization without any I/O
//! until its validity window has elapsed, then issue a new one.
//!
//! ```text
//! Unissued --ensure--> Valid --window elapses--> Expired --ensure--> Valid
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use anonpoetry_core::{
    Address, AuthorizationError, Clock, ConfidentialCompute, DEFAULT_DURATION_DAYS,
    DecryptionAuthorization, Signer,
};

/// Configuration for issuing authorizations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationConfig {
    /// Contracts whose handles the authorization covers
    pub contract_addresses: Vec<Address>,
    /// Validity window length in days
    pub duration_days: u32,
}

impl AuthorizationConfig {
    /// Cover the given contracts for the default duration
    pub fn new(contract_addresses: Vec<Address>) -> Self {
        Self {
            contract_addresses,
            duration_days: DEFAULT_DURATION_DAYS,
        }
    }

    pub fn with_duration_days(mut self, days: u32) -> Self {
        self.duration_days = days;
        self
    }
}

/// Observable state of the cached authorization for one subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationState {
    /// Nothing cached for this subject
    Unissued,
    /// Cached and usable until `expires_at` (unix seconds)
    Valid { expires_at: i64 },
    /// Cached but past its window
    Expired { expired_at: i64 },
}

/// Issues and caches the session's decryption authorization
pub struct AuthorizationManager {
    compute: Arc<dyn ConfidentialCompute>,
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
    config: AuthorizationConfig,
    cached: RwLock<Option<Arc<DecryptionAuthorization>>>,
}

impl AuthorizationManager {
    pub fn new(
        compute: Arc<dyn ConfidentialCompute>,
        signer: Arc<dyn Signer>,
        clock: Arc<dyn Clock>,
        config: AuthorizationConfig,
    ) -> Self {
        Self {
            compute,
            signer,
            clock,
            config,
            cached: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &AuthorizationConfig {
        &self.config
    }

    /// Return a valid authorization for `subject`, issuing one if needed
    ///
    /// A cache hit performs no I/O. On a miss the signer is asked exactly
    /// once. If issuing fails, an expired cached authorization is dropped
    /// so the cache ends up unset.
    pub async fn ensure(
        &self,
        subject: &Address,
    ) -> Result<Arc<DecryptionAuthorization>, AuthorizationError> {
        let now = self.clock.now_utc();

        if let Some(auth) = self.cached_for(subject, now) {
            debug!(
                subject = %subject.short_id(),
                expires_at = auth.expires_at(),
                "Reusing cached decryption authorization"
            );
            return Ok(auth);
        }

        let signer_address = self.signer.address();
        if signer_address != *subject {
            return Err(AuthorizationError::SubjectMismatch {
                expected: *subject,
                actual: signer_address,
            });
        }

        match self.issue(subject, now).await {
            Ok(auth) => Ok(auth),
            Err(e) => {
                self.drop_expired(now);
                warn!(
                    subject = %subject.short_id(),
                    error = %e,
                    "Failed to issue decryption authorization"
                );
                Err(e)
            }
        }
    }

    async fn issue(
        &self,
        subject: &Address,
        now: DateTime<Utc>,
    ) -> Result<Arc<DecryptionAuthorization>, AuthorizationError> {
        let keypair = self
            .compute
            .generate_keypair()
            .map_err(|e| AuthorizationError::KeypairGeneration(e.to_string()))?;

        let request = self.compute.create_eip712(
            &keypair.public_key,
            &self.config.contract_addresses,
            now.timestamp(),
            self.config.duration_days,
        );

        // Lock is not held here: signing may wait on the user
        let signature = self.signer.sign_typed_data(&request).await?;

        let auth = Arc::new(DecryptionAuthorization::new(
            keypair,
            signature,
            *subject,
            &request.message,
        ));
        *self.cached.write() = Some(Arc::clone(&auth));

        info!(
            subject = %subject.short_id(),
            start = auth.start_timestamp,
            duration_days = auth.duration_days,
            contracts = auth.contract_addresses.len(),
            "Issued decryption authorization"
        );
        Ok(auth)
    }

    fn drop_expired(&self, now: DateTime<Utc>) {
        let mut cached = self.cached.write();
        if cached.as_ref().is_some_and(|auth| !auth.is_valid_at(now)) {
            *cached = None;
        }
    }

    fn cached_for(&self, subject: &Address, now: DateTime<Utc>) -> Option<Arc<DecryptionAuthorization>> {
        self.cached
            .read()
            .as_ref()
            .filter(|auth| auth.user_address == *subject && auth.is_valid_at(now))
            .cloned()
    }

    /// The cached authorization, valid or not, without issuing
    pub fn current(&self) -> Option<Arc<DecryptionAuthorization>> {
        self.cached.read().clone()
    }

    /// Drop the cached authorization
    pub fn invalidate(&self) {
        if self.cached.write().take().is_some() {
            debug!("Decryption authorization invalidated");
        }
    }

    /// State of the cache for `subject` at `now`
    pub fn state(&self, subject: &Address, now: DateTime<Utc>) -> AuthorizationState {
        match self.cached.read().as_ref() {
            Some(auth) if auth.user_address == *subject => {
                let expires_at = auth.expires_at();
                if auth.is_valid_at(now) {
                    AuthorizationState::Valid { expires_at }
                } else {
                    AuthorizationState::Expired {
                        expired_at: expires_at,
                    }
                }
            }
            _ => AuthorizationState::Unissued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_compute::MockConfidentialCompute;
    use crate::signer::LocalSigner;
    use anonpoetry_core::{ManualClock, SECONDS_PER_DAY, SignerError};
    use chrono::Duration;

    struct Fixture {
        clock: Arc<ManualClock>,
        signer: Arc<LocalSigner>,
        manager: AuthorizationManager,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::at_unix(0));
        let signer = Arc::new(LocalSigner::from_seed([1; 32]));
        let compute = Arc::new(MockConfidentialCompute::new(clock.clone()));
        let manager = AuthorizationManager::new(
            compute,
            signer.clone(),
            clock.clone(),
            AuthorizationConfig::new(vec![Address::new([0xaa; 20])]),
        );
        Fixture {
            clock,
            signer,
            manager,
        }
    }

    #[tokio::test]
    async fn test_first_ensure_issues() {
        let f = fixture();
        let subject = f.signer.address();
        assert_eq!(f.manager.state(&subject, f.clock.now_utc()), AuthorizationState::Unissued);

        let auth = f.manager.ensure(&subject).await.unwrap();
        assert_eq!(auth.user_address, subject);
        assert_eq!(auth.start_timestamp, 0);
        assert_eq!(auth.duration_days, DEFAULT_DURATION_DAYS);
        assert_eq!(auth.contract_addresses, vec![Address::new([0xaa; 20])]);
        assert_eq!(f.signer.sign_count(), 1);
        assert_eq!(
            f.manager.state(&subject, f.clock.now_utc()),
            AuthorizationState::Valid {
                expires_at: 365 * SECONDS_PER_DAY
            }
        );
    }

    #[tokio::test]
    async fn test_cache_hit_makes_no_signer_call() {
        let f = fixture();
        let subject = f.signer.address();

        let first = f.manager.ensure(&subject).await.unwrap();
        f.clock.advance(Duration::days(364));
        let second = f.manager.ensure(&subject).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.public_key, second.public_key);
        assert_eq!(first.signature, second.signature);
        assert_eq!(f.signer.sign_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_authorization_is_reissued() {
        let f = fixture();
        let subject = f.signer.address();

        let first = f.manager.ensure(&subject).await.unwrap();
        f.clock.advance(Duration::days(366));
        assert!(matches!(
            f.manager.state(&subject, f.clock.now_utc()),
            AuthorizationState::Expired { .. }
        ));

        let second = f.manager.ensure(&subject).await.unwrap();
        assert_eq!(f.signer.sign_count(), 2);
        assert_ne!(first.public_key, second.public_key);
        assert_eq!(second.start_timestamp, 366 * SECONDS_PER_DAY);
    }

    #[tokio::test]
    async fn test_boundary_is_exclusive() {
        let f = fixture();
        let subject = f.signer.address();

        f.manager.ensure(&subject).await.unwrap();
        f.clock.advance(Duration::days(365));
        f.manager.ensure(&subject).await.unwrap();
        assert_eq!(f.signer.sign_count(), 2);
    }

    #[tokio::test]
    async fn test_signer_failure_leaves_cache_unset() {
        let f = fixture();
        let subject = f.signer.address();
        f.signer.set_rejecting(true);

        let result = f.manager.ensure(&subject).await;
        assert!(matches!(
            result,
            Err(AuthorizationError::Signer(SignerError::Rejected(_)))
        ));
        assert!(f.manager.current().is_none());
    }

    #[tokio::test]
    async fn test_failed_reissue_after_expiry_clears_cache() {
        let f = fixture();
        let subject = f.signer.address();
        f.manager.ensure(&subject).await.unwrap();

        f.clock.advance(Duration::days(366));
        f.signer.set_rejecting(true);

        assert!(f.manager.ensure(&subject).await.is_err());
        assert!(f.manager.current().is_none());
        assert_eq!(
            f.manager.state(&subject, f.clock.now_utc()),
            AuthorizationState::Unissued
        );
    }

    #[tokio::test]
    async fn test_subject_mismatch() {
        let f = fixture();
        let other = Address::new([0x11; 20]);

        let result = f.manager.ensure(&other).await;
        assert!(matches!(
            result,
            Err(AuthorizationError::SubjectMismatch { .. })
        ));
        assert_eq!(f.signer.sign_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reissue() {
        let f = fixture();
        let subject = f.signer.address();

        f.manager.ensure(&subject).await.unwrap();
        f.manager.invalidate();
        assert!(f.manager.current().is_none());

        f.manager.ensure(&subject).await.unwrap();
        assert_eq!(f.signer.sign_count(), 2);
    }
}
