//! Shared types for tokenwatch.
//!
//! These types form the data model used across all modules: the catalog
//! snapshot returned by the remote API, per-token price samples and charts,
//! the per-panel load state handed to the host, and the domain error enum.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::{format_change, format_price};

/// Stable token identifier (the catalog `id`, e.g. `"bitcoin"`).
pub type TokenId = String;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One token in the remote catalog.
///
/// Every numeric field is optional: the upstream feed emits `null` for
/// freshly listed tokens and we would rather show a dash than drop the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: TokenId,
    pub symbol: String,
    pub name: String,
    /// Icon URL.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    /// 24-hour traded volume.
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub high_24h: Option<f64>,
    #[serde(default)]
    pub low_24h: Option<f64>,
    #[serde(default)]
    pub price_change_24h: Option<f64>,
    #[serde(default)]
    pub circulating_supply: Option<f64>,
    #[serde(default)]
    pub total_supply: Option<f64>,
    #[serde(default)]
    pub max_supply: Option<f64>,
    #[serde(default)]
    pub ath: Option<f64>,
    #[serde(default)]
    pub atl: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let price = self
            .current_price
            .map(|p| format!("${}", format_price(p)))
            .unwrap_or_else(|| "-".to_string());
        let change = self
            .price_change_percentage_24h
            .map(format_change)
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} ({}) {} [{}]",
            self.symbol.to_uppercase(),
            self.name,
            price,
            change
        )
    }
}

impl CatalogEntry {
    /// Minimal entry with only the identifying fields set.
    pub fn new(id: &str, symbol: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            image: None,
            current_price: None,
            price_change_percentage_24h: None,
            market_cap: None,
            market_cap_rank: None,
            total_volume: None,
            high_24h: None,
            low_24h: None,
            price_change_24h: None,
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            ath: None,
            atl: None,
            last_updated: None,
        }
    }

    /// Market cap usable as a sort key. NaN and negative caps count as unknown.
    pub fn ranking_market_cap(&self) -> Option<f64> {
        self.market_cap.filter(|m| m.is_finite() && *m >= 0.0)
    }

    /// The price to display for this entry.
    ///
    /// A separately fetched sample supersedes the catalog price while it is
    /// inside the staleness window and is not older than the catalog row.
    pub fn effective_price(&self, sample: Option<&PriceSample>, window: Duration) -> Option<f64> {
        match sample {
            Some(s)
                if s.id == self.id
                    && s.is_fresh(window)
                    && self.last_updated.map_or(true, |u| s.fetched_at >= u) =>
            {
                Some(s.price)
            }
            _ => self.current_price,
        }
    }
}

// ---------------------------------------------------------------------------
// Prices and charts
// ---------------------------------------------------------------------------

/// A single price observation for one token, fetched independently of the
/// catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub id: TokenId,
    /// Quote currency, e.g. "usd".
    pub currency: String,
    pub price: f64,
    pub fetched_at: DateTime<Utc>,
}

impl PriceSample {
    pub fn new(id: &str, currency: &str, price: f64) -> Self {
        Self {
            id: id.to_string(),
            currency: currency.to_string(),
            price,
            fetched_at: Utc::now(),
        }
    }

    /// Whether the sample is still inside the staleness window.
    pub fn is_fresh(&self, window: Duration) -> bool {
        Utc::now() - self.fetched_at < window
    }
}

impl fmt::Display for PriceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.id,
            format_price(self.price),
            self.currency.to_uppercase()
        )
    }
}

/// One point of a price chart. `timestamp` is milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub price: f64,
    pub timestamp: i64,
}

impl ChartPoint {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

// ---------------------------------------------------------------------------
// Panel state
// ---------------------------------------------------------------------------

/// Load state of one independently fetched panel (catalog, price, chart).
///
/// A failure is scoped to its own panel; the host renders the message in
/// place of that panel only.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelState<T> {
    Loading,
    Loaded(T),
    Failed(String),
}

impl<T> PanelState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, PanelState::Loading)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PanelState::Failed(_))
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            PanelState::Loaded(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> Default for PanelState<T> {
    fn default() -> Self {
        PanelState::Loading
    }
}

impl<T> From<WatchResult<T>> for PanelState<T> {
    fn from(result: WatchResult<T>) -> Self {
        match result {
            Ok(v) => PanelState::Loaded(v),
            Err(e) => PanelState::Failed(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for tokenwatch.
///
/// `Clone` so a single coalesced fetch failure can be handed to every
/// waiter on that key.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WatchError {
    #[error("Network error ({endpoint}): {message}")]
    Network { endpoint: String, message: String },

    #[error("Parse error ({endpoint}): {message}")]
    Parse { endpoint: String, message: String },

    #[error("Storage error ({key}): {message}")]
    Storage { key: String, message: String },

    #[error("Token not found: {0}")]
    NotFound(String),
}

impl WatchError {
    pub fn network(endpoint: &str, message: impl fmt::Display) -> Self {
        WatchError::Network {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }

    pub fn parse(endpoint: &str, message: impl fmt::Display) -> Self {
        WatchError::Parse {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }

    pub fn storage(key: &str, message: impl fmt::Display) -> Self {
        WatchError::Storage {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

pub type WatchResult<T> = std::result::Result<T, WatchError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> CatalogEntry {
        let mut e = CatalogEntry::new("bitcoin", "btc", "Bitcoin");
        e.current_price = Some(64000.0);
        e.price_change_percentage_24h = Some(1.5);
        e.market_cap = Some(1.2e12);
        e
    }

    #[test]
    fn test_catalog_entry_deserialize_nulls() {
        let json = r#"{
            "id": "newcoin",
            "symbol": "new",
            "name": "New Coin",
            "image": null,
            "current_price": 0.0042,
            "market_cap": null,
            "total_volume": 1200.5,
            "last_updated": "2026-01-05T10:00:00.000Z"
        }"#;
        let e: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.id, "newcoin");
        assert_eq!(e.current_price, Some(0.0042));
        assert!(e.market_cap.is_none());
        assert!(e.ath.is_none());
        assert!(e.last_updated.is_some());
    }

    #[test]
    fn test_ranking_market_cap_ignores_nan() {
        let mut e = btc();
        e.market_cap = Some(f64::NAN);
        assert!(e.ranking_market_cap().is_none());
        e.market_cap = Some(10.0);
        assert_eq!(e.ranking_market_cap(), Some(10.0));
    }

    #[test]
    fn test_effective_price_prefers_fresh_sample() {
        let e = btc();
        let sample = PriceSample::new("bitcoin", "usd", 65000.0);
        let price = e.effective_price(Some(&sample), Duration::seconds(60));
        assert_eq!(price, Some(65000.0));
    }

    #[test]
    fn test_effective_price_ignores_stale_sample() {
        let e = btc();
        let mut sample = PriceSample::new("bitcoin", "usd", 65000.0);
        sample.fetched_at = Utc::now() - Duration::seconds(120);
        let price = e.effective_price(Some(&sample), Duration::seconds(60));
        assert_eq!(price, Some(64000.0));
    }

    #[test]
    fn test_effective_price_ignores_sample_older_than_catalog() {
        let mut e = btc();
        e.last_updated = Some(Utc::now());
        let mut sample = PriceSample::new("bitcoin", "usd", 65000.0);
        sample.fetched_at = Utc::now() - Duration::seconds(10);
        let price = e.effective_price(Some(&sample), Duration::seconds(60));
        assert_eq!(price, Some(64000.0));
    }

    #[test]
    fn test_effective_price_ignores_other_token() {
        let e = btc();
        let sample = PriceSample::new("ethereum", "usd", 3000.0);
        assert_eq!(e.effective_price(Some(&sample), Duration::seconds(60)), Some(64000.0));
    }

    #[test]
    fn test_catalog_entry_display() {
        let s = format!("{}", btc());
        assert!(s.starts_with("BTC (Bitcoin)"));
        assert!(s.contains("$64000.00"));
        assert!(s.contains("+1.50%"));
    }

    #[test]
    fn test_chart_point_time() {
        let p = ChartPoint { price: 1.0, timestamp: 1_700_000_000_000 };
        assert_eq!(p.time().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_panel_state_from_result() {
        let ok: PanelState<u32> = Ok(5).into();
        assert_eq!(ok.loaded(), Some(&5));

        let err: PanelState<u32> = Err(WatchError::NotFound("x".into())).into();
        assert!(err.is_failed());
        assert_eq!(err, PanelState::Failed("Token not found: x".to_string()));

        assert!(PanelState::<u32>::default().is_loading());
    }

    #[test]
    fn test_error_display() {
        let e = WatchError::storage("watchlist", "disk full");
        assert_eq!(e.to_string(), "Storage error (watchlist): disk full");
        let e = WatchError::network("/coins", "HTTP 503");
        assert_eq!(e.to_string(), "Network error (/coins): HTTP 503");
    }
}
