//! Session-scoped staleness cache for remote reads.
//!
//! One `TtlCache` per fetch kind. A fresh entry is returned without a
//! network call; a stale or missing entry triggers exactly one fetch, and
//! callers arriving while it is in flight await the same shared future.
//! Failures are delivered to every waiter but never cached.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::types::WatchResult;

type SharedFetch<V> = Shared<BoxFuture<'static, WatchResult<Arc<V>>>>;

enum Slot<V> {
    Ready { value: Arc<V>, fetched_at: Instant },
    InFlight { generation: u64, fetch: SharedFetch<V> },
}

enum Lookup<V> {
    Hit(Arc<V>),
    Join(u64, SharedFetch<V>),
    Miss,
}

/// Hit / miss counters for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Calls that joined a fetch already in flight.
    pub joined: u64,
}

impl CacheStats {
    /// Fraction of calls served without starting a fetch (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.joined;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.joined) as f64 / total as f64
        }
    }
}

pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    slots: Mutex<HashMap<K, Slot<V>>>,
    next_generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    joined: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            joined: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached value for `key` if it is still fresh.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        match self.slots().get(key) {
            Some(Slot::Ready { value, fetched_at }) if fetched_at.elapsed() < self.ttl => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    /// Return the fresh cached value for `key`, or run `fetch` to get one.
    ///
    /// `fetch` is only called on a miss; concurrent callers for the same key
    /// share its result.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> WatchResult<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = WatchResult<V>> + Send + 'static,
    {
        let (generation, shared) = {
            let mut slots = self.slots();
            let lookup = match slots.get(&key) {
                Some(Slot::Ready { value, fetched_at }) if fetched_at.elapsed() < self.ttl => {
                    Lookup::Hit(value.clone())
                }
                Some(Slot::InFlight { generation, fetch }) => Lookup::Join(*generation, fetch.clone()),
                _ => Lookup::Miss,
            };

            match lookup {
                Lookup::Hit(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = self.name, key = ?key, "Cache hit");
                    return Ok(value);
                }
                Lookup::Join(generation, shared) => {
                    self.joined.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = self.name, key = ?key, "Joining in-flight fetch");
                    (generation, shared)
                }
                Lookup::Miss => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let shared = fetch().map(|r| r.map(Arc::new)).boxed().shared();
                    slots.insert(
                        key.clone(),
                        Slot::InFlight {
                            generation,
                            fetch: shared.clone(),
                        },
                    );
                    debug!(cache = self.name, key = ?key, "Cache miss, fetching");
                    (generation, shared)
                }
            }
        };

        let result = shared.await;
        self.settle(&key, generation, &result);
        result
    }

    /// Record the outcome of fetch `generation`, unless the slot has since
    /// been invalidated or replaced.
    fn settle(&self, key: &K, generation: u64, result: &WatchResult<Arc<V>>) {
        let mut slots = self.slots();
        let current = matches!(
            slots.get(key),
            Some(Slot::InFlight { generation: g, .. }) if *g == generation
        );
        if !current {
            return;
        }

        match result {
            Ok(value) => {
                slots.insert(
                    key.clone(),
                    Slot::Ready {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
            }
            Err(e) => {
                slots.remove(key);
                warn!(cache = self.name, key = ?key, error = %e, "Fetch failed");
            }
        }
    }

    /// Drop `key` so the next call refetches. An in-flight fetch for it
    /// still completes for its waiters but is not stored.
    pub fn invalidate(&self, key: &K) {
        self.slots().remove(key);
    }

    pub fn clear(&self) {
        self.slots().clear();
    }

    /// Remove stale ready entries; in-flight fetches are kept.
    pub fn evict_expired(&self) {
        let ttl = self.ttl;
        self.slots().retain(|_, slot| match slot {
            Slot::Ready { fetched_at, .. } => fetched_at.elapsed() < ttl,
            Slot::InFlight { .. } => true,
        });
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
