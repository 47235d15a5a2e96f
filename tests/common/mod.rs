//! Mock coin API for integration testing.
//!
//! Provides a deterministic `CoinApi` implementation that returns a known
//! catalog, counts calls per endpoint, can delay every response, and can
//! fail individual endpoints on demand. Everything stays in memory.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokenwatch::fetch::api::CoinApi;
use tokenwatch::types::{CatalogEntry, ChartPoint, WatchError, WatchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Coins,
    Price,
    Symbols,
    Chart,
}

pub struct MockCoinService {
    catalog: Vec<CatalogEntry>,
    prices: HashMap<String, f64>,
    latency: Duration,
    calls: Mutex<HashMap<Endpoint, usize>>,
    failing: Mutex<Vec<Endpoint>>,
}

impl MockCoinService {
    pub fn new() -> Self {
        Self::with_catalog(default_catalog())
    }

    pub fn with_catalog(catalog: Vec<CatalogEntry>) -> Self {
        let prices = catalog
            .iter()
            .filter_map(|e| e.current_price.map(|p| (e.id.clone(), p)))
            .collect();
        Self {
            catalog,
            prices,
            latency: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make `endpoint` fail with a network error until cleared.
    pub fn fail(&self, endpoint: Endpoint) {
        self.failing.lock().unwrap().push(endpoint);
    }

    pub fn recover(&self, endpoint: Endpoint) {
        self.failing.lock().unwrap().retain(|e| *e != endpoint);
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        *self.calls.lock().unwrap().get(&endpoint).unwrap_or(&0)
    }

    async fn enter(&self, endpoint: Endpoint, path: &str) -> WatchResult<()> {
        *self.calls.lock().unwrap().entry(endpoint).or_insert(0) += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.lock().unwrap().contains(&endpoint) {
            return Err(WatchError::network(path, "HTTP 503: service unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl CoinApi for MockCoinService {
    async fn coins(&self) -> WatchResult<Vec<CatalogEntry>> {
        self.enter(Endpoint::Coins, "/coins").await?;
        Ok(self.catalog.clone())
    }

    async fn price(&self, id: &str, currency: &str) -> WatchResult<f64> {
        let path = format!("/price/{id}/{currency}");
        self.enter(Endpoint::Price, &path).await?;
        self.prices
            .get(id)
            .copied()
            .ok_or_else(|| WatchError::network(&path, "HTTP 404"))
    }

    async fn symbols(&self, _currency: &str) -> WatchResult<Vec<String>> {
        self.enter(Endpoint::Symbols, "/symbols").await?;
        Ok(self.catalog.iter().map(|e| e.symbol.to_uppercase()).collect())
    }

    async fn chart(&self, id: &str) -> WatchResult<Vec<ChartPoint>> {
        let path = format!("/chart/{id}");
        self.enter(Endpoint::Chart, &path).await?;
        let base = self.prices.get(id).copied().unwrap_or(1.0);
        Ok((0..24)
            .map(|h| ChartPoint {
                price: base * (1.0 + h as f64 / 100.0),
                timestamp: 1_700_000_000_000 + h * 3_600_000,
            })
            .collect())
    }
}

pub fn entry(id: &str, symbol: &str, price: f64, market_cap: Option<f64>) -> CatalogEntry {
    let mut e = CatalogEntry::new(id, symbol, &symbol.to_uppercase());
    e.current_price = Some(price);
    e.market_cap = market_cap;
    e
}

/// A small catalog spanning large caps, tiny prices and a missing cap.
pub fn default_catalog() -> Vec<CatalogEntry> {
    vec![
        entry("bitcoin", "btc", 64000.0, Some(1.26e12)),
        entry("ethereum", "eth", 3100.0, Some(3.7e11)),
        entry("tether", "usdt", 1.0, Some(1.1e11)),
        entry("solana", "sol", 145.0, Some(6.5e10)),
        entry("wrapped-bitcoin", "wbtc", 63950.0, Some(9.8e9)),
        entry("shiba-inu", "shib", 0.0000182, Some(1.07e10)),
        entry("ether-fi", "ethfi", 2.1, Some(4.1e8)),
        entry("fresh-listing", "frsh", 0.0042, None),
    ]
}

/// Deterministic pseudo-random catalog (LCG) for property-style tests.
pub fn generated_catalog(n: usize, seed: u64) -> Vec<CatalogEntry> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };
    const SYMBOLS: &[&str] = &["btc", "eth", "sol", "doge", "bnb", "ada", "xrp", "dot", "link"];

    (0..n)
        .map(|i| {
            let base = SYMBOLS[(next() % SYMBOLS.len() as u64) as usize];
            let symbol = if next() % 3 == 0 {
                format!("{base}{}", next() % 10)
            } else {
                format!("w{base}")
            };
            // Every 7th id repeats the previous one; roughly one cap in five is unknown.
            let id = if i > 0 && i % 7 == 0 {
                format!("tok-{}", i - 1)
            } else {
                format!("tok-{i}")
            };
            let cap = if next() % 5 == 0 {
                None
            } else {
                Some((next() % 1000) as f64)
            };
            entry(&id, &symbol, (next() % 10_000) as f64 / 100.0, cap)
        })
        .collect()
}
