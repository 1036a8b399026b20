// src/config.rs
//! Process configuration from environment variables (`.env` is loaded by `main`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analyze::rules::resolve_rules_path;
use crate::bot::telegram::DEFAULT_API_URL;
use crate::ingest::{FetchOptions, DEFAULT_MAX_CONCURRENCY};

pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_OWNER_ID: &str = "OWNER_ID";
pub const ENV_STORE_PATH: &str = "FEED_CURATOR_STORE_PATH";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "FEED_CURATOR_FETCH_TIMEOUT_SECS";
pub const ENV_LOOKBACK_HOURS: &str = "FEED_CURATOR_LOOKBACK_HOURS";
pub const ENV_MAX_CONCURRENCY: &str = "FEED_CURATOR_MAX_CONCURRENCY";
pub const ENV_TELEGRAM_API_URL: &str = "TELEGRAM_API_URL";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

pub const DEFAULT_STORE_PATH: &str = "data/bot.json";

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    /// 0 disables every owner-only command.
    pub owner_id: i64,
    pub store_path: PathBuf,
    pub rules_path: PathBuf,
    pub fetch_timeout: Duration,
    pub lookback: Duration,
    pub max_concurrency: usize,
    pub telegram_api_url: String,
    pub metrics_addr: Option<SocketAddr>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var(ENV_BOT_TOKEN)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .with_context(|| format!("{ENV_BOT_TOKEN} is not set"))?;

        let timeout_secs: u64 = env_parse(ENV_FETCH_TIMEOUT_SECS)?.unwrap_or(12);
        let lookback_hours: u64 = env_parse(ENV_LOOKBACK_HOURS)?.unwrap_or(48);
        let lookback_secs = lookback_hours
            .checked_mul(3600)
            .with_context(|| {
                format!("{ENV_LOOKBACK_HOURS}: cannot parse `{lookback_hours}` (too large)")
            })?;

        Ok(Self {
            bot_token,
            owner_id: env_parse(ENV_OWNER_ID)?.unwrap_or(0),
            store_path: env_nonempty(ENV_STORE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            rules_path: resolve_rules_path(),
            fetch_timeout: Duration::from_secs(timeout_secs.max(1)),
            lookback: Duration::from_secs(lookback_secs),
            max_concurrency: env_parse(ENV_MAX_CONCURRENCY)?.unwrap_or(DEFAULT_MAX_CONCURRENCY),
            telegram_api_url: env_nonempty(ENV_TELEGRAM_API_URL)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            metrics_addr: env_parse(ENV_METRICS_ADDR)?,
        })
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::new(self.fetch_timeout, self.lookback).with_max_concurrency(self.max_concurrency)
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Unset or blank is `None`; a value that does not parse is an error.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_nonempty(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("{key}: cannot parse `{raw}`"))
        })
        .transpose()
}
