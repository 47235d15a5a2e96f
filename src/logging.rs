//! Structured logging setup for hosts embedding tokenwatch.
//!
//! `RUST_LOG` wins when set; otherwise the configured filter applies.
//! JSON output is selected by config or by setting `TOKENWATCH_LOG_JSON`.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Env var that forces JSON log output.
pub const JSON_LOG_ENV: &str = "TOKENWATCH_LOG_JSON";

/// Install the global `tracing` subscriber.
///
/// Errors if a global subscriber is already installed (the host may have
/// its own).
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.filter));

    let json_logging = cfg.json || std::env::var(JSON_LOG_ENV).is_ok();

    let installed = if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .try_init()
    } else {
        fmt().with_env_filter(env_filter).with_target(true).try_init()
    };

    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
