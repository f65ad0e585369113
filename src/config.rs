// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! Everything has a sensible default so a bare process starts; production
//! deployments override via env vars or a `.env` file.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a freshly issued login session stays valid (seconds).
    pub session_ttl_secs: i64,
    /// How long a freshly issued password-reset token stays valid (seconds).
    pub reset_token_ttl_secs: i64,
    /// Extra margin an expired credential row is retained before the sweep
    /// removes it (seconds).
    pub sweep_retention_secs: i64,
    /// Interval between credential sweeps (seconds).
    pub sweep_interval_secs: u64,
    /// Collections a newly registered user may own.
    pub default_max_collections: usize,
    /// Attempts the entry upsert loop makes before surfacing contention.
    pub upsert_retry_budget: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_ttl_secs: 6 * 60 * 60,
            reset_token_ttl_secs: 30 * 60,
            sweep_retention_secs: 15 * 60,
            sweep_interval_secs: 10 * 60,
            default_max_collections: 3,
            upsert_retry_budget: 8,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        Ok(Self {
            session_ttl_secs: parse_var("SESSION_TTL_SECS", defaults.session_ttl_secs)?,
            reset_token_ttl_secs: parse_var("RESET_TOKEN_TTL_SECS", defaults.reset_token_ttl_secs)?,
            sweep_retention_secs: parse_var("SWEEP_RETENTION_SECS", defaults.sweep_retention_secs)?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
            default_max_collections: parse_var(
                "DEFAULT_MAX_COLLECTIONS",
                defaults.default_max_collections,
            )?,
            upsert_retry_budget: parse_var("UPSERT_RETRY_BUDGET", defaults.upsert_retry_budget)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is not parseable")]
    Invalid(&'static str),
}
