//! Feed curator: binary entrypoint.
//! Loads configuration, wires the store, fetcher and Telegram client, then long-polls
//! until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feed_curator::bot::telegram::{run_polling, TelegramClient};
use feed_curator::{BotConfig, BotHandler, FeedFetcher, JsonFileStore, Scanner};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_curator=info,warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real env vars win.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = BotConfig::from_env().context("loading configuration")?;

    if let Some(addr) = cfg.metrics_addr {
        feed_curator::metrics::install(addr)?;
    }

    // Fail fast on a broken rule file; scans reload it each run.
    let rules = feed_curator::analyze::load_rules_from(&cfg.rules_path)
        .with_context(|| format!("loading rules from {}", cfg.rules_path.display()))?;
    if cfg.owner_id == 0 {
        tracing::warn!("OWNER_ID is not set; owner-only commands are disabled");
    }

    let store = Arc::new(JsonFileStore::open(&cfg.store_path)?);
    let fetcher = FeedFetcher::new(cfg.fetch_options()).context("building HTTP client")?;
    let telegram = TelegramClient::with_base_url(cfg.telegram_api_url.clone(), cfg.bot_token.clone());

    let handler = Arc::new(BotHandler::new(
        store.clone(),
        store.clone(),
        Arc::new(telegram.clone()),
        Scanner::new(fetcher),
        cfg.owner_id,
        cfg.rules_path.clone(),
    ));

    tracing::info!(
        store = %cfg.store_path.display(),
        rules = %cfg.rules_path.display(),
        rule_count = rules.scorer.len(),
        threshold = rules.threshold,
        top_n = rules.top_n,
        timeout_s = cfg.fetch_timeout.as_secs(),
        lookback_h = cfg.lookback.as_secs() / 3600,
        "feed curator starting"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "ctrl-c handler failed");
        }
    };
    run_polling(telegram, handler, shutdown).await;
    Ok(())
}
