// src/scan.rs
//! One scan: fetch every feed, rank against the rule set, classify the outcome.

use metrics::{counter, gauge, histogram};

use crate::analyze::{RuleSet, ScoredItem};
use crate::ingest::FeedFetcher;

/// What a scan produced. The two empty outcomes are not failures, but they
/// call for different messages to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// No feeds configured; nothing was fetched.
    NoSources,
    /// Feeds were fetched but nothing cleared the threshold.
    NoMatches { fetched: usize },
    /// Ranked items, best first, at most `top_n`.
    Ranked {
        fetched: usize,
        items: Vec<ScoredItem>,
    },
}

impl ScanOutcome {
    pub fn items(&self) -> &[ScoredItem] {
        match self {
            ScanOutcome::Ranked { items, .. } => items,
            _ => &[],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ScanOutcome::NoSources => "no_sources",
            ScanOutcome::NoMatches { .. } => "no_matches",
            ScanOutcome::Ranked { .. } => "ranked",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scanner {
    fetcher: FeedFetcher,
}

impl Scanner {
    pub fn new(fetcher: FeedFetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &FeedFetcher {
        &self.fetcher
    }

    /// `urls` and `rules` are snapshots taken by the caller for this scan.
    pub async fn scan(&self, urls: &[String], rules: &RuleSet) -> ScanOutcome {
        let outcome = if urls.is_empty() {
            ScanOutcome::NoSources
        } else {
            let items = self.fetcher.fetch_batch(urls).await;
            let fetched = items.len();
            let ranked = rules.rank(items);
            if ranked.is_empty() {
                ScanOutcome::NoMatches { fetched }
            } else {
                ScanOutcome::Ranked {
                    fetched,
                    items: ranked,
                }
            }
        };

        counter!("scan_runs_total", "outcome" => outcome.label()).increment(1);
        histogram!("scan_ranked_items").record(outcome.items().len() as f64);
        gauge!("scan_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

        tracing::info!(
            target: "scan",
            feeds = urls.len(),
            rules = rules.scorer.len(),
            threshold = rules.threshold,
            top_n = rules.top_n,
            outcome = outcome.label(),
            ranked = outcome.items().len(),
            "scan finished"
        );

        outcome
    }
}
