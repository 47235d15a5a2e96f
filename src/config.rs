//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `tokenwatch.toml` and deserializes into strongly-typed structs.
//! Every field has a default, so a missing section (or no file at all via
//! `AppConfig::default()`) still yields a usable configuration.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::Secret;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "tokenwatch.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Quote currency for price lookups.
    pub currency: String,
    /// Overall per-request timeout.
    pub timeout_secs: u64,
    /// How long fetched catalog / price / chart data stays fresh.
    pub staleness_secs: u64,
    /// Name of the env var holding an API key, if the service wants one.
    pub api_key_env: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            currency: "usd".to_string(),
            timeout_secs: 10,
            staleness_secs: 60,
            api_key_env: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    /// Resolve the configured API key env var, if any.
    pub fn api_key(&self) -> Result<Option<Secret<String>>> {
        match &self.api_key_env {
            Some(env) => Ok(Some(Secret::new(AppConfig::resolve_env(env)?))),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file backing the watchlist / favorites sets.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: crate::storage::file::DEFAULT_STORE_FILE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "tokenwatch=info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        anyhow::ensure!(
            !config.api.base_url.trim().is_empty(),
            "api.base_url must not be empty"
        );
        anyhow::ensure!(
            !config.api.currency.trim().is_empty(),
            "api.currency must not be empty"
        );
        anyhow::ensure!(config.api.timeout_secs > 0, "api.timeout_secs must be positive");
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.api.currency, "usd");
        assert_eq!(cfg.api.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.api.staleness(), Duration::from_secs(60));
        assert_eq!(cfg.storage.path, "tokenwatch_store.json");
        assert_eq!(cfg.logging.filter, "tokenwatch=info");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn test_parse_partial_file() {
        let cfg = AppConfig::parse(
            r#"
            [api]
            base_url = "https://prices.example.com"
            staleness_secs = 30

            [logging]
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.api.base_url, "https://prices.example.com");
        assert_eq!(cfg.api.staleness_secs, 30);
        assert_eq!(cfg.api.currency, "usd");
        assert!(cfg.logging.json);
        assert_eq!(cfg.storage.path, "tokenwatch_store.json");
    }

    #[test]
    fn test_parse_empty_file() {
        let cfg = AppConfig::parse("").unwrap();
        assert_eq!(cfg.api.timeout_secs, 10);
    }

    #[test]
    fn test_parse_rejects_zero_timeout() {
        assert!(AppConfig::parse("[api]\ntimeout_secs = 0\n").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_currency() {
        assert!(AppConfig::parse("[api]\ncurrency = \"\"\n").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/tmp/tokenwatch_missing_config_12345.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_api_key_resolution() {
        let var = format!("TOKENWATCH_TEST_KEY_{}", uuid::Uuid::new_v4().simple());
        std::env::set_var(&var, "secret-value");

        let cfg = ApiConfig {
            api_key_env: Some(var.clone()),
            ..ApiConfig::default()
        };
        let key = cfg.api_key().unwrap().unwrap();
        assert_eq!(key.expose_secret(), "secret-value");

        std::env::remove_var(&var);
        assert!(cfg.api_key().is_err());
        assert!(ApiConfig::default().api_key().unwrap().is_none());
    }
}
