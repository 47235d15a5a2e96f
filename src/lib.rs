//! tokenwatch: token price lookup, search ranking and persisted watchlists.
//!
//! Library crate embedded by a host UI. The host renders; this crate
//! fetches, caches, ranks, formats and persists.

pub mod config;
pub mod types;
pub mod format;
pub mod rank;
pub mod storage;
pub mod fetch;
pub mod session;
pub mod logging;

pub use fetch::CatalogFetcher;
pub use format::format_price;
pub use rank::{rank, RankedView};
pub use session::Session;
pub use storage::{KeyValueStore, PersistedSetStore};
pub use types::{CatalogEntry, PanelState, WatchError, WatchResult};
