// src/lib.rs
// Public library surface for the binary and the integration tests.

// Feed fetching and parsing
pub mod ingest;

// Rule file, scoring and ranking
pub mod analyze;

pub mod scan;
pub mod store;

// Chat delivery and commands
pub mod bot;
pub mod notify;

pub mod config;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{RuleError, RuleSet, ScoredItem, Scorer};
pub use crate::bot::{BotError, BotHandler, Command, IncomingMessage};
pub use crate::config::BotConfig;
pub use crate::ingest::{fetch_batch, FeedFetcher, FeedItem, FetchError, FetchOptions};
pub use crate::notify::{MessageSink, TextFormat};
pub use crate::scan::{ScanOutcome, Scanner};
pub use crate::store::{JsonFileStore, MemoryStore, SettingsStore, SourceStore};
