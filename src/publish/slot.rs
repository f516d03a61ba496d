//! Single-slot latest-wins exchange
//!
//! The only structure shared between the sampling loop and the publish
//! worker. Capacity is exactly one: inserting evicts any unconsumed value,
//! so a slow consumer sees the freshest state instead of a backlog.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

/// Bounded-capacity-1 exchange with non-blocking insert and
/// timeout-bounded async take.
#[derive(Debug, Default)]
pub struct Slot<T> {
    value: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self { value: Mutex::new(None), notify: Notify::new() }
    }

    /// Insert a value, returning the evicted stale one if the slot was full.
    ///
    /// Never blocks beyond the internal lock; safe to call from the
    /// sampling loop every cycle.
    pub fn put(&self, item: T) -> Option<T> {
        let evicted = self.lock().replace(item);
        self.notify.notify_one();
        evicted
    }

    /// Take the pending value without waiting.
    pub fn try_take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Wait up to `timeout` for a value.
    ///
    /// Returns `None` on timeout so the worker can observe shutdown between
    /// waits instead of parking indefinitely.
    pub async fn take_timeout(&self, timeout: Duration) -> Option<T> {
        if let Some(item) = self.try_take() {
            return Some(item);
        }
        match tokio::time::timeout(timeout, self.notify.notified()).await {
            Ok(()) => self.try_take(),
            Err(_) => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<T>> {
        // A poisoned slot just means a panicking thread held the guard; the
        // Option inside is still coherent.
        self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
