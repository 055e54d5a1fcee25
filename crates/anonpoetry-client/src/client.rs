//! High-level poetry client
//!
//! Ties the batch builder, authorization manager, decryptor and reassembler
//! to the poem contract. One client is one user session: it owns the
//! session's decryption authorization and remembers which poems it has
//! already been granted access to.

use std::sync::Arc;

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use anonpoetry_core::{
    Address, Clock, ConfidentialCompute, EncryptedBatch, Handle, Ledger, PoetryError, PoetryResult,
    Signer, codec,
};
use anonpoetry_crypto::{AuthorizationManager, AuthorizationState};

use crate::batch::EncryptedBatchBuilder;
use crate::config::ClientConfig;
use crate::contract::{PoemContract, PoemId, PoemMeta, Published};
use crate::decrypt::BatchDecryptor;
use crate::reassemble::{reassemble_count, reassemble_text};

/// Outcome of [`PoetryClient::ensure_read_access`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    /// A grant transaction was mined
    Granted,
    /// This session was already granted access; nothing was sent
    AlreadyGranted,
}

/// A poem as seen by this session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoemRecord {
    pub id: PoemId,
    pub timestamp: i64,
    pub title: Option<String>,
    pub body: Option<String>,
    pub likes: Option<u32>,
    /// Whether title, body and likes were recovered
    pub decrypted: bool,
}

impl PoemRecord {
    /// Metadata only, nothing decrypted
    pub fn from_meta(meta: PoemMeta) -> Self {
        Self {
            id: meta.id,
            timestamp: meta.timestamp,
            title: None,
            body: None,
            likes: None,
            decrypted: false,
        }
    }
}

/// One row of the like ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub id: PoemId,
    /// `None` when the count could not be revealed
    pub likes: Option<u32>,
    pub timestamp: i64,
    pub title: Option<String>,
}

/// A user's session against the poem contract
pub struct PoetryClient {
    config: ClientConfig,
    user: Address,
    compute: Arc<dyn ConfidentialCompute>,
    contract: PoemContract,
    authorizations: AuthorizationManager,
    decryptor: BatchDecryptor,
    granted: DashSet<PoemId>,
}

impl PoetryClient {
    /// Create a session for the ledger's sender
    ///
    /// `signer` must sign for the same address the ledger sends from.
    pub fn new(
        config: ClientConfig,
        ledger: Arc<dyn Ledger>,
        compute: Arc<dyn ConfidentialCompute>,
        signer: Arc<dyn Signer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let user = ledger.sender();
        let contract = PoemContract::new(ledger, config.contract_address);
        let authorizations = AuthorizationManager::new(
            Arc::clone(&compute),
            signer,
            Arc::clone(&clock),
            config.authorization_config(),
        );
        let decryptor = BatchDecryptor::new(Arc::clone(&compute), clock, config.contract_address);

        Self {
            config,
            user,
            compute,
            contract,
            authorizations,
            decryptor,
            granted: DashSet::new(),
        }
    }

    pub fn user(&self) -> Address {
        self.user
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn contract(&self) -> &PoemContract {
        &self.contract
    }

    pub fn authorizations(&self) -> &AuthorizationManager {
        &self.authorizations
    }

    /// State of this session's decryption authorization at `now`
    pub fn authorization_state(&self, now: chrono::DateTime<chrono::Utc>) -> AuthorizationState {
        self.authorizations.state(&self.user, now)
    }

    fn builder(&self) -> EncryptedBatchBuilder {
        EncryptedBatchBuilder::new(Arc::clone(&self.compute), self.contract.address(), self.user)
    }

    async fn seal_text(&self, text: &str) -> PoetryResult<EncryptedBatch> {
        let mut builder = self.builder();
        builder.extend_chunks(&codec::encode(text))?;
        builder.seal().await
    }

    /// Encrypt and publish a poem
    ///
    /// Title and body must contain something besides whitespace; they are
    /// stored exactly as given.
    pub async fn publish(&self, title: &str, body: &str) -> PoetryResult<Published> {
        if title.trim().is_empty() {
            return Err(PoetryError::InvalidInput("title is empty".to_string()));
        }
        if body.trim().is_empty() {
            return Err(PoetryError::InvalidInput("body is empty".to_string()));
        }

        let title_batch = self.seal_text(title).await?;
        let body_batch = self.seal_text(body).await?;

        let published = self.contract.publish_poem(&title_batch, &body_batch).await?;
        info!(
            poem_id = published.poem_id,
            author = %self.user.short_id(),
            title_chunks = title_batch.len(),
            body_chunks = body_batch.len(),
            tx = %published.tx_hash.short_id(),
            "Published poem"
        );
        Ok(published)
    }

    /// Add one encrypted like to a poem
    pub async fn like(&self, poem_id: PoemId) -> PoetryResult<()> {
        let mut builder = self.builder();
        builder.add_u32(1)?;
        let increment = builder.seal().await?;

        let receipt = self.contract.like(poem_id, &increment).await?;
        debug!(
            poem_id,
            tx = %receipt.tx_hash.short_id(),
            "Liked poem"
        );
        Ok(())
    }

    /// Make sure this session may decrypt a poem's handles
    pub async fn ensure_read_access(&self, poem_id: PoemId) -> PoetryResult<AccessGrant> {
        if self.granted.contains(&poem_id) {
            return Ok(AccessGrant::AlreadyGranted);
        }

        self.contract.grant_read_for_caller(poem_id).await?;
        self.granted.insert(poem_id);
        info!(
            poem_id,
            reader = %self.user.short_id(),
            "Granted read access"
        );
        Ok(AccessGrant::Granted)
    }

    /// Metadata of the most recent poems, newest first
    pub async fn list_recent(&self) -> PoetryResult<Vec<PoemRecord>> {
        let total = self.contract.total_poems().await?;
        let oldest = total.saturating_sub(self.config.recent_limit as u64);

        let mut records = Vec::with_capacity((total - oldest) as usize);
        for id in (oldest..total).rev() {
            records.push(PoemRecord::from_meta(self.contract.poem_meta(id).await?));
        }

        debug!(total, listed = records.len(), "Listed recent poems");
        Ok(records)
    }

    /// Decrypt a poem's title, body and like count in one round trip
    pub async fn reveal(&self, poem_id: PoemId) -> PoetryResult<PoemRecord> {
        self.ensure_read_access(poem_id).await?;

        let meta = self.contract.poem_meta(poem_id).await?;
        let title_handles = self.contract.title_handles(poem_id).await?;
        let body_handles = self.contract.body_handles(poem_id).await?;
        let likes_handle = self.contract.likes(poem_id).await?;

        let mut handles: Vec<Handle> =
            Vec::with_capacity(title_handles.len() + body_handles.len() + 1);
        handles.extend_from_slice(&title_handles);
        handles.extend_from_slice(&body_handles);
        handles.push(likes_handle);

        let authorization = self.authorizations.ensure(&self.user).await?;
        let values = self.decryptor.decrypt_many(&handles, &authorization).await?;

        Ok(PoemRecord {
            id: meta.id,
            timestamp: meta.timestamp,
            title: Some(reassemble_text(&title_handles, &values)?),
            body: Some(reassemble_text(&body_handles, &values)?),
            likes: Some(reassemble_count(&likes_handle, &values)?),
            decrypted: true,
        })
    }

    /// Decrypt only the like count of a poem
    pub async fn reveal_likes(&self, poem_id: PoemId) -> PoetryResult<u32> {
        self.ensure_read_access(poem_id).await?;

        let likes_handle = self.contract.likes(poem_id).await?;
        let authorization = self.authorizations.ensure(&self.user).await?;
        let values = self
            .decryptor
            .decrypt_many(&[likes_handle], &authorization)
            .await?;
        reassemble_count(&likes_handle, &values)
    }

    /// Rank poems by likes, then by recency
    ///
    /// Entries whose count cannot be revealed are kept with `likes: None`
    /// and placed after every revealed entry.
    pub async fn ranking(&self, records: &[PoemRecord]) -> Vec<RankingEntry> {
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let likes = match self.reveal_likes(record.id).await {
                Ok(likes) => Some(likes),
                Err(e) => {
                    warn!(poem_id = record.id, error = %e, "Could not reveal like count");
                    None
                }
            };
            entries.push(RankingEntry {
                id: record.id,
                likes,
                timestamp: record.timestamp,
                title: record.title.clone(),
            });
        }

        // None < Some(_), so descending order puts unrevealed entries last
        entries.sort_by(|a, b| {
            b.likes
                .cmp(&a.likes)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        entries.truncate(self.config.ranking_limit);
        entries
    }

    /// Rank the most recent poems
    pub async fn ranking_recent(&self) -> PoetryResult<Vec<RankingEntry>> {
        let records = self.list_recent().await?;
        Ok(self.ranking(&records).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anonpoetry_core::{ComputeError, LedgerError, ManualClock};
    use anonpoetry_crypto::{LocalSigner, MockConfidentialCompute};

    use crate::mock_ledger::MockPoemLedger;

    struct Session {
        clock: Arc<ManualClock>,
        compute: Arc<MockConfidentialCompute>,
        ledger: MockPoemLedger,
        signer: Arc<LocalSigner>,
        client: PoetryClient,
    }

    fn session() -> Session {
        let config = ClientConfig::default();
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let compute = Arc::new(MockConfidentialCompute::new(clock.clone()));
        let signer = Arc::new(LocalSigner::from_seed([4; 32]));
        let ledger = MockPoemLedger::new(
            config.contract_address,
            signer.address(),
            compute.clone(),
            clock.clone(),
        );
        let client = PoetryClient::new(
            config,
            Arc::new(ledger.clone()),
            compute.clone(),
            signer.clone(),
            clock.clone(),
        );
        Session {
            clock,
            compute,
            ledger,
            signer,
            client,
        }
    }

    #[tokio::test]
    async fn test_publish_rejects_blank_content() {
        let s = session();
        assert!(matches!(
            s.client.publish("   ", "body").await,
            Err(PoetryError::InvalidInput(_))
        ));
        assert!(matches!(
            s.client.publish("title", "\n\t").await,
            Err(PoetryError::InvalidInput(_))
        ));
        assert_eq!(s.compute.encrypt_calls(), 0);
        assert_eq!(s.ledger.submissions(), 0);
    }

    #[tokio::test]
    async fn test_publish_seals_title_and_body_separately() {
        let s = session();
        let published = s.client.publish("Title", "Body text").await.unwrap();
        assert_eq!(published.poem_id, 0);
        assert_eq!(published.timestamp, 1_700_000_000);
        assert_eq!(s.compute.encrypt_calls(), 2);
    }

    #[tokio::test]
    async fn test_reveal_keeps_surrounding_whitespace() {
        let s = session();
        let published = s.client.publish("  Dawn ", "line one\nline two\n").await.unwrap();

        let record = s.client.reveal(published.poem_id).await.unwrap();
        assert_eq!(record.title.as_deref(), Some("  Dawn "));
        assert_eq!(record.body.as_deref(), Some("line one\nline two\n"));
        assert_eq!(record.likes, Some(0));
        assert!(record.decrypted);
        assert_eq!(s.compute.decrypt_calls(), 1);
        assert_eq!(s.signer.sign_count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_read_access_is_idempotent() {
        let s = session();
        let published = s.client.publish("t", "b").await.unwrap();
        let before = s.ledger.submissions();

        assert_eq!(
            s.client.ensure_read_access(published.poem_id).await.unwrap(),
            AccessGrant::Granted
        );
        assert_eq!(
            s.client.ensure_read_access(published.poem_id).await.unwrap(),
            AccessGrant::AlreadyGranted
        );
        assert_eq!(s.ledger.submissions(), before + 1);
    }

    #[tokio::test]
    async fn test_grant_failure_propagates_and_is_not_remembered() {
        let s = session();
        let published = s.client.publish("t", "b").await.unwrap();

        s.ledger
            .fail_next_submit(LedgerError::SubmitFailed("nonce too low".to_string()));
        assert!(matches!(
            s.client.ensure_read_access(published.poem_id).await,
            Err(PoetryError::Ledger(LedgerError::SubmitFailed(_)))
        ));

        assert_eq!(
            s.client.ensure_read_access(published.poem_id).await.unwrap(),
            AccessGrant::Granted
        );
    }

    #[tokio::test]
    async fn test_reveal_unknown_poem_fails() {
        let s = session();
        assert!(matches!(
            s.client.reveal(42).await,
            Err(PoetryError::Ledger(LedgerError::Reverted { .. }))
        ));
    }

    #[tokio::test]
    async fn test_list_recent_newest_first_and_limited() {
        let s = session();
        let client = PoetryClient::new(
            ClientConfig::default().with_recent_limit(3),
            Arc::new(s.ledger.clone()),
            s.compute.clone(),
            s.signer.clone(),
            s.clock.clone(),
        );
        for i in 0..5 {
            client
                .publish(&format!("poem {}", i), "words")
                .await
                .unwrap();
            s.clock.advance(chrono::Duration::seconds(10));
        }

        let records = client.list_recent().await.unwrap();
        let ids: Vec<PoemId> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 3, 2]);
        assert!(records.iter().all(|r| !r.decrypted && r.title.is_none()));
        assert!(records[0].timestamp > records[1].timestamp);
    }

    #[tokio::test]
    async fn test_list_recent_empty_ledger() {
        let s = session();
        assert!(s.client.list_recent().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ranking_puts_failed_entries_last() {
        let s = session();
        for title in ["a", "b", "c"] {
            s.client.publish(title, "body").await.unwrap();
            s.clock.advance(chrono::Duration::seconds(1));
        }
        s.client.like(0).await.unwrap();

        let records = s.client.list_recent().await.unwrap();

        // Fail the decryption for the newest poem's count
        s.client.ensure_read_access(2).await.unwrap();
        s.compute
            .fail_next_decrypt(ComputeError::Unavailable("relayer busy".to_string()));

        let ranking = s.client.ranking(&records).await;
        let order: Vec<(PoemId, Option<u32>)> = ranking.iter().map(|e| (e.id, e.likes)).collect();
        assert_eq!(order, vec![(0, Some(1)), (1, Some(0)), (2, None)]);
    }
}
