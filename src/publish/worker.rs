//! Background publish worker
//!
//! One task owns the store connection and drains the single-slot queue.
//! Failures are isolated per snapshot: transient store errors are retried
//! a bounded number of times, permanent ones are logged and dropped, and
//! nothing short of shutdown stops the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::slot::Slot;
use super::store::{RetryPolicy, StoreAdapter};
use crate::error::Result;
use crate::types::Snapshot;

/// How long the worker parks on an empty slot before re-checking shutdown.
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// One enqueued upsert: destination plus the snapshot to write.
#[derive(Debug, Clone)]
pub struct PublishItem {
    pub collection: String,
    pub document: String,
    pub snapshot: Snapshot,
}

/// Handle to the publish pipeline.
///
/// [`publish`](Publisher::publish) never blocks the caller beyond a slot
/// insert; the worker task does all network I/O. Dropping the handle
/// cancels the worker; prefer [`shutdown`](Publisher::shutdown) to give it
/// a bounded drain window.
pub struct Publisher {
    adapter: Arc<dyn StoreAdapter>,
    policy: RetryPolicy,
    slot: Arc<Slot<PublishItem>>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl Publisher {
    /// Spawn the worker with the default retry policy.
    pub fn spawn<A: StoreAdapter>(adapter: A) -> Self {
        Self::spawn_with_policy(adapter, RetryPolicy::default())
    }

    pub fn spawn_with_policy<A: StoreAdapter>(adapter: A, policy: RetryPolicy) -> Self {
        let adapter: Arc<dyn StoreAdapter> = Arc::new(adapter);
        let slot = Arc::new(Slot::new());
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(worker_task(
            Arc::clone(&adapter),
            Arc::clone(&slot),
            policy,
            cancel.clone(),
        ));
        Self { adapter, policy, slot, cancel, worker: Some(worker) }
    }

    /// Enqueue a snapshot, superseding any still-unsent predecessor.
    pub fn publish(&self, collection: &str, document: &str, snapshot: Snapshot) {
        let item = PublishItem {
            collection: collection.to_string(),
            document: document.to_string(),
            snapshot,
        };
        if let Some(stale) = self.slot.put(item) {
            trace!(
                "Superseded unsent snapshot for {}/{}",
                stale.collection, stale.document
            );
        }
    }

    /// Send one document outside the latest-wins slot.
    ///
    /// For occasional side documents (directory registration) that must not
    /// be superseded by the telemetry stream. Runs on a short-lived
    /// detached task; the caller never blocks.
    pub fn publish_once(&self, collection: &str, document: &str, snapshot: Snapshot) {
        let adapter = Arc::clone(&self.adapter);
        let policy = self.policy;
        let item = PublishItem {
            collection: collection.to_string(),
            document: document.to_string(),
            snapshot,
        };
        tokio::spawn(async move {
            if let Err(err) = deliver(adapter.as_ref(), &policy, &item).await {
                warn!(
                    "Dropping one-shot document {}/{}: {}",
                    item.collection, item.document, err
                );
            }
        });
    }

    /// Signal the worker and wait up to `grace` for it to finish.
    ///
    /// The worker drains at most one pending snapshot on its way out and an
    /// in-flight upsert is allowed to complete; only after the grace window
    /// does the task get aborted.
    pub async fn shutdown(mut self, grace: Duration) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            let abort = worker.abort_handle();
            if tokio::time::timeout(grace, worker).await.is_err() {
                warn!("Publish worker did not drain within {:?}, aborting", grace);
                abort.abort();
            }
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn worker_task(
    adapter: Arc<dyn StoreAdapter>,
    slot: Arc<Slot<PublishItem>>,
    policy: RetryPolicy,
    cancel: CancellationToken,
) {
    info!("Publish worker started ({})", adapter.name());
    let mut delivered = 0u64;
    let mut dropped = 0u64;

    loop {
        // Cancellation is only observed between items, never mid-send. On
        // shutdown the freshest pending snapshot still goes out.
        let maybe_item = tokio::select! {
            _ = cancel.cancelled() => {
                if let Some(last) = slot.try_take() {
                    attempt_delivery(adapter.as_ref(), &policy, &last, &mut delivered, &mut dropped)
                        .await;
                }
                break;
            }
            item = slot.take_timeout(IDLE_WAIT) => item,
        };
        let Some(item) = maybe_item else { continue };
        attempt_delivery(adapter.as_ref(), &policy, &item, &mut delivered, &mut dropped).await;
    }

    info!("Publish worker stopped ({} delivered, {} dropped)", delivered, dropped);
}

async fn attempt_delivery(
    adapter: &dyn StoreAdapter,
    policy: &RetryPolicy,
    item: &PublishItem,
    delivered: &mut u64,
    dropped: &mut u64,
) {
    match deliver(adapter, policy, item).await {
        Ok(()) => {
            *delivered += 1;
            trace!("Delivered snapshot to {}/{}", item.collection, item.document);
        }
        Err(err) => {
            *dropped += 1;
            warn!("Dropping snapshot for {}/{}: {}", item.collection, item.document, err);
        }
    }
}

/// Serialize and send one item, retrying transient failures.
async fn deliver(
    adapter: &dyn StoreAdapter,
    policy: &RetryPolicy,
    item: &PublishItem,
) -> Result<()> {
    let body = adapter.serialize(&item.snapshot);
    let mut attempt = 1u32;
    loop {
        match adapter.send(&item.collection, &item.document, body.clone()).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let backoff = policy.backoff_for(attempt);
                debug!(
                    "Transient store failure (attempt {}/{}), retrying in {:?}: {}",
                    attempt, policy.max_attempts, backoff, err
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
