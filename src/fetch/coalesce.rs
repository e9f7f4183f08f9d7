// src/fetch/coalesce.rs
//! Request coalescing (singleflight pattern)
//!
//! While a request for a resource key is in flight, later callers asking for
//! the same key subscribe to its outcome instead of issuing their own.

use crate::error::Result;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

enum Role<V> {
    Leader(broadcast::Sender<Result<V>>),
    Follower(broadcast::Receiver<Result<V>>),
}

/// Removes the in-flight entry when the leading request finishes or is
/// dropped, so waiters never block on an abandoned request.
struct InflightGuard<'a, K: Eq + Hash, V> {
    inflight: &'a DashMap<K, broadcast::Sender<Result<V>>>,
    key: &'a K,
}

impl<K: Eq + Hash, V> Drop for InflightGuard<'_, K, V> {
    fn drop(&mut self) {
        self.inflight.remove(self.key);
    }
}

/// Request coalescer keyed by `K`, sharing outcomes of type `V`
pub struct RequestCoalescer<K, V>
where
    K: Eq + Hash,
{
    inflight: DashMap<K, broadcast::Sender<Result<V>>>,
    coalesced_count: AtomicU64,
}

impl<K, V> RequestCoalescer<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
            coalesced_count: AtomicU64::new(0),
        }
    }

    /// Run `fetch` for `key` unless a request for it is already in flight,
    /// in which case wait for that request's outcome
    pub async fn coalesce<F, Fut>(&self, key: &K, fetch: F) -> Result<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        loop {
            // The entry API makes check-and-register atomic per shard
            let role = match self.inflight.entry(key.clone()) {
                Entry::Occupied(entry) => Role::Follower(entry.get().subscribe()),
                Entry::Vacant(entry) => {
                    let (tx, _rx) = broadcast::channel(1);
                    entry.insert(tx.clone());
                    Role::Leader(tx)
                }
            };

            match role {
                Role::Follower(mut rx) => {
                    debug!("Coalescing request for {:?}", key);
                    self.coalesced_count.fetch_add(1, Ordering::Relaxed);

                    match rx.recv().await {
                        Ok(outcome) => return outcome,
                        Err(_) => {
                            // Leader went away without an outcome
                            debug!("Coalesced request for {:?} abandoned, retrying", key);
                            continue;
                        }
                    }
                }
                Role::Leader(tx) => {
                    let guard = InflightGuard {
                        inflight: &self.inflight,
                        key,
                    };

                    let outcome = fetch().await;

                    // Unregister before broadcasting so late callers start fresh
                    drop(guard);
                    let _ = tx.send(outcome.clone());
                    return outcome;
                }
            }
        }
    }

    /// Number of callers that waited on another caller's request
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced_count.load(Ordering::Relaxed)
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }
}

impl<K, V> Default for RequestCoalescer<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
