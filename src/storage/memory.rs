//! In-process key-value store.
//!
//! Backs sessions that do not need durability, and tests: reads and
//! writes can be made to fail, and every operation can be slowed down to
//! widen race windows.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::KeyValueStore;
use crate::types::{WatchError, WatchResult};

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation sleeps for `latency` before touching the map.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Make subsequent reads fail with a storage error.
    pub fn set_failing_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes and removals fail with a storage error.
    pub fn set_failing_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw value currently stored under `key`, bypassing failure injection.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> WatchResult<Option<String>> {
        self.delay().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(WatchError::storage(key, "read failed"));
        }
        Ok(self.raw(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> WatchResult<()> {
        self.delay().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WatchError::storage(key, "write failed"));
        }
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> WatchResult<()> {
        self.delay().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WatchError::storage(key, "remove failed"));
        }
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
