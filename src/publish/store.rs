//! Store adapter capability
//!
//! One trait hides which document store the bridge publishes to. Adapters
//! own their wire format and their HTTP client; the pipeline stays
//! adapter-agnostic and only knows "serialize, then send, retry if the
//! error is transient".

use std::time::Duration;

use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::types::Snapshot;

/// Capability interface for a remote document store.
#[async_trait]
pub trait StoreAdapter: Send + Sync + 'static {
    /// Short adapter name for log lines.
    fn name(&self) -> &'static str;

    /// Encode a snapshot into this store's wire body.
    fn serialize(&self, snapshot: &Snapshot) -> serde_json::Value;

    /// Upsert the encoded body into `collection`/`document`.
    ///
    /// Implementations return a [`Store`](crate::BridgeError::Store) error
    /// carrying the HTTP status so the worker can classify it.
    async fn send(&self, collection: &str, document: &str, body: serde_json::Value)
    -> Result<()>;
}

/// Bounded-retry settings for transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per snapshot, first try included.
    pub max_attempts: u32,
    /// Base backoff, doubled per retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: Duration::from_millis(100) }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based): 100ms, 200ms, 400ms...
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff * (1 << retry.min(5).saturating_sub(1))
    }
}

/// Construct the configured store adapter.
pub fn build_adapter(config: &StoreConfig) -> Result<Box<dyn StoreAdapter>> {
    match config {
        StoreConfig::Firestore { project_id, api_key } => Ok(Box::new(
            super::FirestoreAdapter::new(project_id.clone(), api_key.clone())?,
        )),
        StoreConfig::Supabase { url, api_key } => {
            Ok(Box::new(super::SupabaseAdapter::new(url.clone(), api_key.clone())?))
        }
    }
}

#[async_trait]
impl StoreAdapter for Box<dyn StoreAdapter> {
    fn name(&self) -> &'static str {
        self.as_ref().name()
    }

    fn serialize(&self, snapshot: &Snapshot) -> serde_json::Value {
        self.as_ref().serialize(snapshot)
    }

    async fn send(
        &self,
        collection: &str,
        document: &str,
        body: serde_json::Value,
    ) -> Result<()> {
        self.as_ref().send(collection, document, body).await
    }
}
