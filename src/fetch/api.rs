//! Remote coin / price API.
//!
//! Endpoints (relative to the configured base URL):
//! - `GET /coins`               → array of catalog entries
//! - `GET /price/{id}/{cur}`    → `{ "price": "<decimal string>" }`
//! - `GET /symbols/{cur}`       → array of symbol strings
//! - `GET /chart/{id}`          → array of `{ price, timestamp }`
//!
//! Auth: none by default. When an API key is configured it is sent as
//! `X-API-KEY`, which older deployments of the service still require.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;
use crate::types::{CatalogEntry, ChartPoint, WatchError, WatchResult};

const API_KEY_HEADER: &str = "X-API-KEY";

/// Longest response body quoted back in an error message.
const MAX_ERROR_BODY: usize = 200;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over the remote catalog / price service.
///
/// Network failures and non-2xx statuses map to `WatchError::Network`,
/// undecodable bodies to `WatchError::Parse`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoinApi: Send + Sync {
    /// The full coin catalog.
    async fn coins(&self) -> WatchResult<Vec<CatalogEntry>>;

    /// Spot price of one coin in `currency`.
    async fn price(&self, id: &str, currency: &str) -> WatchResult<f64>;

    /// Symbols quotable in `currency`.
    async fn symbols(&self, currency: &str) -> WatchResult<Vec<String>>;

    /// Recent price history of one coin.
    async fn chart(&self, id: &str) -> WatchResult<Vec<ChartPoint>>;
}

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: PriceField,
}

/// The service sends the price as a string; tolerate a bare number too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceField {
    Text(String),
    Number(f64),
}

/// `/symbols` is a plain array; older deployments wrapped it as
/// `{ "symbols": ["BTCUSD", ...] }` with the quote currency appended.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SymbolsResponse {
    List(Vec<String>),
    Wrapped { symbols: Vec<String> },
}

impl SymbolsResponse {
    fn into_symbols(self, currency: &str) -> Vec<String> {
        let mut out: Vec<String> = match self {
            SymbolsResponse::List(symbols) => symbols
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            SymbolsResponse::Wrapped { symbols } => {
                let suffix = currency.to_uppercase();
                symbols
                    .into_iter()
                    .filter_map(|s| {
                        let upper = s.trim().to_uppercase();
                        upper
                            .strip_suffix(&suffix)
                            .filter(|base| !base.is_empty())
                            .map(str::to_string)
                    })
                    .collect()
            }
        };
        let mut seen = std::collections::HashSet::new();
        out.retain(|s| seen.insert(s.clone()));
        out
    }
}

fn parse_price(path: &str, field: PriceField) -> WatchResult<f64> {
    let price = match field {
        PriceField::Number(n) => n,
        PriceField::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| WatchError::parse(path, format!("invalid price {s:?}: {e}")))?,
    };
    if !price.is_finite() || price < 0.0 {
        return Err(WatchError::parse(path, format!("price out of range: {price}")));
    }
    Ok(price)
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the coin service.
pub struct HttpCoinApi {
    http: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl HttpCoinApi {
    /// Create a new client. `timeout` bounds every request end to end.
    pub fn new(base_url: &str, timeout: Duration, api_key: Option<Secret<String>>) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tokenwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for coin API")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(cfg: &ApiConfig) -> Result<Self> {
        Self::new(&cfg.base_url, cfg.timeout(), cfg.api_key()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -- Internal helpers ------------------------------------------------

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> WatchResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Fetching from coin API");

        let mut req = self.http.get(&url);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key.expose_secret().as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WatchError::network(path, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WatchError::network(
                path,
                format!("HTTP {status}: {}", truncate(&body)),
            ));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| WatchError::network(path, e))?;

        serde_json::from_str(&body).map_err(|e| WatchError::parse(path, e))
    }
}

#[async_trait]
impl CoinApi for HttpCoinApi {
    async fn coins(&self) -> WatchResult<Vec<CatalogEntry>> {
        self.get_json("/coins").await
    }

    async fn price(&self, id: &str, currency: &str) -> WatchResult<f64> {
        let path = format!(
            "/price/{}/{}",
            urlencoding::encode(id),
            urlencoding::encode(currency)
        );
        let resp: PriceResponse = self.get_json(&path).await?;
        parse_price(&path, resp.price)
    }

    async fn symbols(&self, currency: &str) -> WatchResult<Vec<String>> {
        let path = format!("/symbols/{}", urlencoding::encode(currency));
        let resp: SymbolsResponse = self.get_json(&path).await?;
        Ok(resp.into_symbols(currency))
    }

    async fn chart(&self, id: &str) -> WatchResult<Vec<ChartPoint>> {
        let path = format!("/chart/{}", urlencoding::encode(id));
        self.get_json(&path).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
