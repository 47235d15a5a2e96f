//! Catalog, price, symbol and chart fetching.
//!
//! `CatalogFetcher` wraps a [`CoinApi`] with one staleness cache per fetch
//! kind. Each kind is cached and fails on its own: a chart error never
//! evicts or blocks the catalog or a price.

pub mod api;
pub mod cache;

use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::types::{CatalogEntry, ChartPoint, PriceSample, TokenId, WatchError, WatchResult};
use api::{CoinApi, HttpCoinApi};
use cache::{CacheStats, TtlCache};

/// Default staleness window for every fetch kind.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(60);

/// Combined cache counters across all fetch kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetcherStats {
    pub catalog: CacheStats,
    pub prices: CacheStats,
    pub symbols: CacheStats,
    pub charts: CacheStats,
}

/// Cached, coalescing reads against the remote coin service.
///
/// Scoped to one session: create it where the session starts and pass it
/// to whoever needs it. There is no process-wide instance.
pub struct CatalogFetcher {
    api: Arc<dyn CoinApi>,
    currency: String,
    staleness: Duration,
    catalog: TtlCache<(), Vec<CatalogEntry>>,
    prices: TtlCache<TokenId, PriceSample>,
    symbols: TtlCache<String, Vec<String>>,
    charts: TtlCache<TokenId, Vec<ChartPoint>>,
}

impl CatalogFetcher {
    pub fn new(api: Arc<dyn CoinApi>, currency: &str, staleness: Duration) -> Self {
        Self {
            api,
            currency: currency.to_lowercase(),
            staleness,
            catalog: TtlCache::new("catalog", staleness),
            prices: TtlCache::new("price", staleness),
            symbols: TtlCache::new("symbols", staleness),
            charts: TtlCache::new("chart", staleness),
        }
    }

    /// Build a fetcher over the HTTP client described by `cfg`.
    pub fn from_config(cfg: &ApiConfig) -> Result<Self> {
        let api = HttpCoinApi::from_config(cfg)?;
        Ok(Self::new(Arc::new(api), &cfg.currency, cfg.staleness()))
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    /// The staleness window as a `chrono` duration, for comparing against
    /// sample timestamps.
    pub fn price_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.staleness).unwrap_or_else(|_| chrono::Duration::seconds(60))
    }

    // -- Reads -----------------------------------------------------------

    /// The full coin catalog.
    pub async fn fetch_catalog(&self) -> WatchResult<Arc<Vec<CatalogEntry>>> {
        let api = self.api.clone();
        self.catalog
            .get_or_fetch((), move || async move {
                let coins = api.coins().await?;
                info!(count = coins.len(), "Catalog fetched");
                Ok(coins)
            })
            .await
    }

    /// Look up one catalog entry by id.
    pub async fn find_entry(&self, id: &str) -> WatchResult<CatalogEntry> {
        let catalog = self.fetch_catalog().await?;
        catalog
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| WatchError::NotFound(id.to_string()))
    }

    /// Spot price of one token in the configured currency.
    pub async fn fetch_price(&self, id: &str) -> WatchResult<Arc<PriceSample>> {
        let api = self.api.clone();
        let currency = self.currency.clone();
        let id = id.to_string();
        self.prices
            .get_or_fetch(id.clone(), move || async move {
                let price = api.price(&id, &currency).await?;
                debug!(id = %id, price, currency = %currency, "Price fetched");
                Ok(PriceSample::new(&id, &currency, price))
            })
            .await
    }

    /// Prices for several tokens, fetched concurrently. Each id resolves
    /// independently, in input order.
    pub async fn fetch_prices<S: AsRef<str>>(
        &self,
        ids: &[S],
    ) -> Vec<(TokenId, WatchResult<Arc<PriceSample>>)> {
        let results = join_all(ids.iter().map(|id| self.fetch_price(id.as_ref()))).await;
        ids.iter()
            .map(|id| id.as_ref().to_string())
            .zip(results)
            .collect()
    }

    /// Symbols quotable in the configured currency.
    pub async fn fetch_symbols(&self) -> WatchResult<Arc<Vec<String>>> {
        let api = self.api.clone();
        let currency = self.currency.clone();
        self.symbols
            .get_or_fetch(currency.clone(), move || async move {
                let symbols = api.symbols(&currency).await?;
                info!(count = symbols.len(), currency = %currency, "Symbols fetched");
                Ok(symbols)
            })
            .await
    }

    /// Recent price history for one token.
    pub async fn fetch_chart(&self, id: &str) -> WatchResult<Arc<Vec<ChartPoint>>> {
        let api = self.api.clone();
        let id = id.to_string();
        self.charts
            .get_or_fetch(id.clone(), move || async move {
                let mut points = api.chart(&id).await?;
                points.sort_by_key(|p| p.timestamp);
                debug!(id = %id, points = points.len(), "Chart fetched");
                Ok(points)
            })
            .await
    }

    // -- Invalidation ----------------------------------------------------

    pub fn invalidate_catalog(&self) {
        self.catalog.invalidate(&());
    }

    pub fn invalidate_price(&self, id: &str) {
        self.prices.invalidate(&id.to_string());
    }

    pub fn invalidate_chart(&self, id: &str) {
        self.charts.invalidate(&id.to_string());
    }

    /// Drop stale entries from every cache.
    pub fn evict_expired(&self) {
        self.catalog.evict_expired();
        self.prices.evict_expired();
        self.symbols.evict_expired();
        self.charts.evict_expired();
    }

    pub fn clear(&self) {
        self.catalog.clear();
        self.prices.clear();
        self.symbols.clear();
        self.charts.clear();
    }

    pub fn stats(&self) -> FetcherStats {
        FetcherStats {
            catalog: self.catalog.stats(),
            prices: self.prices.stats(),
            symbols: self.symbols.stats(),
            charts: self.charts.stats(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
