//! Single-flight object cache
//!
//! A concurrent mapping from cache key to an in-flight-or-resolved load.
//! The slot is stored *before* the load settles, so every concurrent caller
//! for the same key awaits the same future and at most one request is in
//! flight per key.
//!
//! Failure policy: a rejected load is removed once its waiters have observed
//! the shared error, so a transient network failure never poisons the cache.
//! A load that resolves to an absent object (`Ok(None)`) is a value like any
//! other and stays cached until explicitly invalidated.

use std::future::Future;

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;

use crate::types::Result;

pub mod keys;

type Slot<V> = Shared<BoxFuture<'static, Result<V>>>;

/// Concurrent single-flight memoization cache
pub struct SingleFlight<V: Clone> {
    slots: DashMap<String, Slot<V>>,
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Return the cached (pending or resolved) value for `key`, or invoke
    /// `load` exactly once and share its outcome with every concurrent
    /// caller.
    ///
    /// The check-and-insert is atomic relative to other callers: `load` runs
    /// only for the caller that created the slot, and the slot is published
    /// before any suspension point.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| load().boxed().shared())
            .value()
            .clone();

        let result = slot.clone().await;

        if result.is_err() {
            // Clear only our own failed slot; a newer slot under the same key
            // must survive.
            self.slots.remove_if(key, |_, existing| existing.ptr_eq(&slot));
        }

        result
    }

    /// Remove the slot for `key` unconditionally; the next load issues a
    /// fresh request.
    pub fn invalidate(&self, key: &str) {
        self.slots.remove(key);
    }

    /// Number of live slots (pending or resolved)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every slot
    pub fn clear(&self) {
        self.slots.clear();
    }
}

impl<V> Default for SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
