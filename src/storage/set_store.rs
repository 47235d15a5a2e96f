//! Persisted ordered id sets (watchlist, favorites).
//!
//! Each set lives under one key of a [`KeyValueStore`] as a JSON array of
//! token ids. Every mutation is a read-modify-write over the whole array,
//! serialized through one async mutex so racing mutations cannot lose each
//! other's updates. After a successful write the in-memory snapshot is
//! replaced, the membership version is bumped and a [`MembershipChange`] is
//! broadcast so holders of older snapshots know to re-read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::KeyValueStore;
use crate::types::{TokenId, WatchError, WatchResult};

/// Storage key of the watchlist set.
pub const WATCHLIST_KEY: &str = "watchlist";

/// Storage key of the favorites set.
pub const FAVORITES_KEY: &str = "favorites";

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Notification sent after a membership mutation has been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipChange {
    Added { id: TokenId, version: u64 },
    Removed { id: TokenId, version: u64 },
    Cleared { version: u64 },
}

impl MembershipChange {
    pub fn version(&self) -> u64 {
        match self {
            MembershipChange::Added { version, .. }
            | MembershipChange::Removed { version, .. }
            | MembershipChange::Cleared { version } => *version,
        }
    }
}

pub struct PersistedSetStore<S: ?Sized> {
    store: Arc<S>,
    key: String,
    /// Held across every read-modify-write-notify cycle, and by `get` so a
    /// read never lands between a mutation's write and its cache update.
    lock: Mutex<()>,
    snapshot: RwLock<Option<Vec<TokenId>>>,
    version: AtomicU64,
    changes: broadcast::Sender<MembershipChange>,
}

impl<S: KeyValueStore + ?Sized> PersistedSetStore<S> {
    pub fn new(store: Arc<S>, key: &str) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            store,
            key: key.to_string(),
            lock: Mutex::new(()),
            snapshot: RwLock::new(None),
            version: AtomicU64::new(0),
            changes,
        }
    }

    pub fn watchlist(store: Arc<S>) -> Self {
        Self::new(store, WATCHLIST_KEY)
    }

    pub fn favorites(store: Arc<S>) -> Self {
        Self::new(store, FAVORITES_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    // -- Reads -----------------------------------------------------------

    /// Read the set from storage and refresh the cached snapshot.
    ///
    /// Fails soft: a storage error is logged and reported as an empty set.
    /// The snapshot keeps its previous state then, so a later read retries.
    pub async fn get(&self) -> Vec<TokenId> {
        let _guard = self.lock.lock().await;
        match self.read_stored().await {
            Ok(ids) => {
                self.set_snapshot(ids.clone());
                ids
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read set, treating as empty");
                Vec::new()
            }
        }
    }

    /// Membership test against the most recently observed set.
    /// `false` until the set has been read or mutated at least once.
    pub fn contains(&self, id: &str) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|s| s == id))
    }

    /// The most recently observed set, empty if nothing was observed yet.
    pub fn snapshot(&self) -> Vec<TokenId> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }

    /// Whether the set has been observed at least once.
    pub fn is_loaded(&self) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Incremented once per persisted mutation.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MembershipChange> {
        self.changes.subscribe()
    }

    // -- Mutations -------------------------------------------------------

    /// Append `id` if it is not already present.
    ///
    /// Returns `Ok(false)` without writing when `id` is already a member.
    /// A failed write is returned to the caller and leaves the snapshot as
    /// it was.
    pub async fn add(&self, id: &str) -> WatchResult<bool> {
        let _guard = self.lock.lock().await;
        let mut ids = self.read_stored().await?;

        if ids.iter().any(|s| s == id) {
            debug!(key = %self.key, id, "Already a member, nothing to add");
            self.set_snapshot(ids);
            return Ok(false);
        }

        ids.push(id.to_string());
        self.persist(&ids).await?;
        let count = ids.len();
        self.set_snapshot(ids);

        let version = self.bump_version();
        self.notify(MembershipChange::Added {
            id: id.to_string(),
            version,
        });
        info!(key = %self.key, id, count, version, "Added to set");
        Ok(true)
    }

    /// Remove every occurrence of `id`. `Ok(false)` if it was not a member.
    pub async fn remove(&self, id: &str) -> WatchResult<bool> {
        let _guard = self.lock.lock().await;
        let mut ids = self.read_stored().await?;

        let before = ids.len();
        ids.retain(|s| s != id);
        if ids.len() == before {
            debug!(key = %self.key, id, "Not a member, nothing to remove");
            self.set_snapshot(ids);
            return Ok(false);
        }

        self.persist(&ids).await?;
        let count = ids.len();
        self.set_snapshot(ids);

        let version = self.bump_version();
        self.notify(MembershipChange::Removed {
            id: id.to_string(),
            version,
        });
        info!(key = %self.key, id, count, version, "Removed from set");
        Ok(true)
    }

    /// Drop the whole set from storage.
    pub async fn clear(&self) -> WatchResult<()> {
        let _guard = self.lock.lock().await;
        self.store.remove_item(&self.key).await?;
        self.set_snapshot(Vec::new());

        let version = self.bump_version();
        self.notify(MembershipChange::Cleared { version });
        info!(key = %self.key, version, "Set cleared");
        Ok(())
    }

    // -- Internal helpers ------------------------------------------------

    /// Read and decode the stored array.
    ///
    /// Storage errors propagate. A value that does not decode is logged and
    /// treated as empty, so the next mutation overwrites it. Duplicates left
    /// by older writers are dropped, keeping the first occurrence.
    async fn read_stored(&self) -> WatchResult<Vec<TokenId>> {
        let Some(raw) = self.store.get_item(&self.key).await? else {
            return Ok(Vec::new());
        };

        let ids: Vec<TokenId> = match serde_json::from_str(&raw) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Stored set is not a JSON string array, treating as empty");
                return Ok(Vec::new());
            }
        };

        let mut unique: Vec<TokenId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Ok(unique)
    }

    async fn persist(&self, ids: &[TokenId]) -> WatchResult<()> {
        let json = serde_json::to_string(ids)
            .map_err(|e| WatchError::storage(&self.key, format!("failed to encode set: {e}")))?;
        self.store.set_item(&self.key, &json).await.map_err(|e| {
            warn!(key = %self.key, error = %e, "Failed to persist set");
            e
        })
    }

    fn set_snapshot(&self, ids: Vec<TokenId>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(ids);
    }

    fn bump_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn notify(&self, change: MembershipChange) {
        // No receivers is fine; nobody is rendering.
        let _ = self.changes.send(change);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
