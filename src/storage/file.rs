//! JSON file key-value store.
//!
//! Keeps every key in one JSON object on disk (`{"watchlist": "[\"bitcoin\"]"}`).
//! Writes go to a uniquely named temp file next to the target and are then
//! renamed over it, so a crash mid-write never leaves a truncated file.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::KeyValueStore;
use crate::types::{WatchError, WatchResult};

/// Default store file path.
pub const DEFAULT_STORE_FILE: &str = "tokenwatch_store.json";

type Items = BTreeMap<String, String>;

pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes load-modify-save cycles on the shared file.
    io_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self, key: &str) -> WatchResult<Items> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No store file yet");
                return Ok(Items::new());
            }
            Err(e) => {
                return Err(WatchError::storage(
                    key,
                    format!("failed to read {}: {e}", self.path.display()),
                ))
            }
        };

        if json.trim().is_empty() {
            return Ok(Items::new());
        }

        serde_json::from_str(&json).map_err(|e| {
            WatchError::storage(key, format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    async fn save(&self, key: &str, items: &Items) -> WatchResult<()> {
        let json = serde_json::to_string_pretty(items)
            .map_err(|e| WatchError::storage(key, format!("failed to serialise store: {e}")))?;

        let tmp = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));

        tokio::fs::write(&tmp, json.as_bytes()).await.map_err(|e| {
            WatchError::storage(key, format!("failed to write {}: {e}", tmp.display()))
        })?;

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(WatchError::storage(
                key,
                format!("failed to replace {}: {e}", self.path.display()),
            ));
        }

        debug!(path = %self.path.display(), keys = items.len(), "Store saved");
        Ok(())
    }

    /// Delete the store file (for testing or reset).
    pub async fn delete(&self) -> WatchResult<()> {
        let _guard = self.io_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Store file deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WatchError::storage(
                "*",
                format!("failed to delete {}: {e}", self.path.display()),
            )),
        }
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_FILE)
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get_item(&self, key: &str) -> WatchResult<Option<String>> {
        let _guard = self.io_lock.lock().await;
        let items = self.load(key).await?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> WatchResult<()> {
        let _guard = self.io_lock.lock().await;
        let mut items = self.load(key).await?;
        items.insert(key.to_string(), value.to_string());
        self.save(key, &items).await
    }

    async fn remove_item(&self, key: &str) -> WatchResult<()> {
        let _guard = self.io_lock.lock().await;
        let mut items = self.load(key).await?;
        if items.remove(key).is_some() {
            self.save(key, &items).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
