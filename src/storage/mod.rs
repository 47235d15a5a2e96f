//! Persistence layer.
//!
//! Defines the `KeyValueStore` trait (the durable string store the host
//! provides) and the `PersistedSetStore` that keeps watchlist / favorites
//! sets in it as JSON-encoded arrays of token ids.

pub mod file;
pub mod memory;
pub mod set_store;

use async_trait::async_trait;

use crate::types::WatchResult;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use set_store::{MembershipChange, PersistedSetStore, FAVORITES_KEY, WATCHLIST_KEY};

/// Abstraction over a durable string-valued key-value store.
///
/// Values are opaque strings; callers are responsible for encoding.
/// Read and write failures are reported as `WatchError::Storage`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, `None` if nothing is stored.
    async fn get_item(&self, key: &str) -> WatchResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> WatchResult<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn remove_item(&self, key: &str) -> WatchResult<()>;
}
