//! One interactive display session.
//!
//! Owns the transient query string and the current selection, and ties
//! the fetcher, the watchlist and the ranking together for the host:
//!
//! - `refresh` captures a [`ViewSnapshot`] (catalog panel, membership,
//!   query) that ranks on demand and knows when it has gone stale.
//! - `select` hands out a [`SelectionTicket`]; detail loads carry it and
//!   their results are discarded on arrival if the selection moved on.
//! - watchlist actions go straight to the persisted set store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::join;
use tracing::{debug, info, warn};

use crate::fetch::CatalogFetcher;
use crate::format::format_price;
use crate::rank::{rank, RankedView};
use crate::storage::{KeyValueStore, PersistedSetStore};
use crate::types::{CatalogEntry, ChartPoint, PanelState, PriceSample, TokenId, WatchResult};

// ---------------------------------------------------------------------------
// Snapshots and tickets
// ---------------------------------------------------------------------------

/// Everything needed to render the list once.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub catalog: PanelState<Arc<Vec<CatalogEntry>>>,
    pub members: Vec<TokenId>,
    pub query: Option<String>,
    membership_version: u64,
    query_generation: u64,
}

impl ViewSnapshot {
    /// Ranked sections, or `None` while the catalog panel is not loaded.
    pub fn ranked(&self) -> Option<RankedView<'_>> {
        self.catalog
            .loaded()
            .map(|catalog| rank(catalog, self.query.as_deref(), &self.members))
    }

    pub fn membership_version(&self) -> u64 {
        self.membership_version
    }
}

/// Proof of which token was selected, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTicket {
    id: TokenId,
    generation: u64,
}

impl SelectionTicket {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Detail panels for one selected token. Each panel loads independently.
#[derive(Debug, Clone)]
pub struct DetailView {
    pub id: TokenId,
    pub price: PanelState<Arc<PriceSample>>,
    pub chart: PanelState<Arc<Vec<ChartPoint>>>,
}

/// One row of the watchlist prices list.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistRow {
    pub id: TokenId,
    pub price: PanelState<Arc<PriceSample>>,
}

impl WatchlistRow {
    /// Accessory text: `"$64000.00"`, `"Loading..."` or `"-"`.
    pub fn price_label(&self) -> String {
        match &self.price {
            PanelState::Loaded(sample) => format!("${}", format_price(sample.price)),
            PanelState::Loading => "Loading...".to_string(),
            PanelState::Failed(_) => "-".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session<S: ?Sized> {
    fetcher: Arc<CatalogFetcher>,
    watchlist: Arc<PersistedSetStore<S>>,
    query: RwLock<Option<String>>,
    query_generation: AtomicU64,
    selection: RwLock<Option<SelectionTicket>>,
    selection_generation: AtomicU64,
}

impl<S: KeyValueStore + ?Sized> Session<S> {
    pub fn new(fetcher: Arc<CatalogFetcher>, watchlist: Arc<PersistedSetStore<S>>) -> Self {
        Self {
            fetcher,
            watchlist,
            query: RwLock::new(None),
            query_generation: AtomicU64::new(0),
            selection: RwLock::new(None),
            selection_generation: AtomicU64::new(0),
        }
    }

    pub fn fetcher(&self) -> &CatalogFetcher {
        &self.fetcher
    }

    pub fn watchlist(&self) -> &PersistedSetStore<S> {
        &self.watchlist
    }

    // -- Query -----------------------------------------------------------

    /// Replace the search text. Snapshots taken under the old text become
    /// stale.
    pub fn set_query(&self, query: Option<&str>) {
        *self.query.write().unwrap_or_else(PoisonError::into_inner) = query.map(str::to_string);
        let generation = self.query_generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(query = query.unwrap_or(""), generation, "Query changed");
    }

    pub fn query(&self) -> Option<String> {
        self.query
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // -- List view -------------------------------------------------------

    /// Capture catalog, membership and query for one render.
    ///
    /// A catalog failure becomes a failed panel; membership is read from
    /// storage only if it has not been observed yet.
    pub async fn refresh(&self) -> ViewSnapshot {
        let query_generation = self.query_generation.load(Ordering::SeqCst);
        let query = self.query();
        let membership_version = self.watchlist.version();

        let (catalog, members) = join!(self.fetcher.fetch_catalog(), async {
            if self.watchlist.is_loaded() {
                self.watchlist.snapshot()
            } else {
                self.watchlist.get().await
            }
        });

        let catalog = match catalog {
            Ok(catalog) => PanelState::Loaded(catalog),
            Err(e) => {
                warn!(error = %e, "Catalog failed to load");
                PanelState::Failed(e.to_string())
            }
        };

        ViewSnapshot {
            catalog,
            members,
            query,
            membership_version,
            query_generation,
        }
    }

    /// Whether `snapshot` still reflects the current query and membership.
    pub fn is_current(&self, snapshot: &ViewSnapshot) -> bool {
        snapshot.query_generation == self.query_generation.load(Ordering::SeqCst)
            && snapshot.membership_version == self.watchlist.version()
    }

    /// Force the next `refresh` to refetch the catalog.
    pub fn reload_catalog(&self) {
        self.fetcher.invalidate_catalog();
    }

    // -- Selection -------------------------------------------------------

    /// Make `id` the displayed token. Earlier tickets stop being current.
    pub fn select(&self, id: &str) -> SelectionTicket {
        let generation = self.selection_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let ticket = SelectionTicket {
            id: id.to_string(),
            generation,
        };
        *self.selection.write().unwrap_or_else(PoisonError::into_inner) = Some(ticket.clone());
        debug!(id, generation, "Token selected");
        ticket
    }

    /// Return to the list. Outstanding detail loads will be discarded.
    pub fn clear_selection(&self) {
        self.selection_generation.fetch_add(1, Ordering::SeqCst);
        *self.selection.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn selected(&self) -> Option<SelectionTicket> {
        self.selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_selected(&self, ticket: &SelectionTicket) -> bool {
        self.selected().as_ref() == Some(ticket)
    }

    /// Load the price panel for `ticket`. `None` if the selection changed
    /// while the fetch was in flight.
    pub async fn load_price(&self, ticket: &SelectionTicket) -> Option<PanelState<Arc<PriceSample>>> {
        let result = self.fetcher.fetch_price(&ticket.id).await;
        self.accept(ticket, "price", result)
    }

    /// Load the chart panel for `ticket`. `None` if the selection changed
    /// while the fetch was in flight.
    pub async fn load_chart(
        &self,
        ticket: &SelectionTicket,
    ) -> Option<PanelState<Arc<Vec<ChartPoint>>>> {
        let result = self.fetcher.fetch_chart(&ticket.id).await;
        self.accept(ticket, "chart", result)
    }

    /// Load price and chart concurrently. A failure in one leaves the other
    /// loaded. `None` if the selection changed before both arrived.
    pub async fn load_detail(&self, ticket: &SelectionTicket) -> Option<DetailView> {
        let (price, chart) = join!(
            self.fetcher.fetch_price(&ticket.id),
            self.fetcher.fetch_chart(&ticket.id)
        );
        let price = self.accept(ticket, "price", price)?;
        let chart = self.accept(ticket, "chart", chart)?;
        Some(DetailView {
            id: ticket.id.clone(),
            price,
            chart,
        })
    }

    /// Drop a refreshed price / chart so the next load refetches it.
    pub fn reload_detail(&self, ticket: &SelectionTicket) {
        self.fetcher.invalidate_price(&ticket.id);
        self.fetcher.invalidate_chart(&ticket.id);
    }

    fn accept<T>(
        &self,
        ticket: &SelectionTicket,
        panel: &'static str,
        result: WatchResult<T>,
    ) -> Option<PanelState<T>> {
        if !self.is_selected(ticket) {
            debug!(id = %ticket.id, panel, "Discarding result for stale selection");
            return None;
        }
        if let Err(e) = &result {
            warn!(id = %ticket.id, panel, error = %e, "Panel failed to load");
        }
        Some(PanelState::from(result))
    }

    // -- Watchlist -------------------------------------------------------

    /// Add or remove `id`; returns whether it is a member afterwards.
    pub async fn toggle_watchlist(&self, id: &str) -> WatchResult<bool> {
        if self.watchlist.contains(id) {
            if self.watchlist.remove(id).await? {
                info!(id, "Removed from watchlist");
            } else {
                debug!(id, "Not on watchlist, nothing removed");
            }
            Ok(false)
        } else {
            if self.watchlist.add(id).await? {
                info!(id, "Added to watchlist");
            } else {
                debug!(id, "Already on watchlist, nothing added");
            }
            Ok(true)
        }
    }

    /// Current price for every watchlist entry, in watchlist order.
    pub async fn watchlist_prices(&self) -> Vec<WatchlistRow> {
        let ids = self.watchlist.get().await;
        self.fetcher
            .fetch_prices(&ids)
            .await
            .into_iter()
            .map(|(id, result)| WatchlistRow {
                id,
                price: PanelState::from(result),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
