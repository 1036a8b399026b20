// src/analyze/rank.rs
use serde::Serialize;

use crate::analyze::scoring::Scorer;
use crate::ingest::FeedItem;

/// A feed item with its score and the rule keys that produced it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: FeedItem,
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Score every item on `title + "\n" + summary`, preserving input order.
pub fn score_items(items: Vec<FeedItem>, scorer: &Scorer) -> Vec<ScoredItem> {
    items
        .into_iter()
        .map(|item| {
            let (score, reasons) = scorer.score(&item.scoring_text());
            ScoredItem {
                item,
                score,
                reasons,
            }
        })
        .collect()
}

/// Keep items with `score >= threshold`, sort by score descending (stable:
/// ties keep their input order) and truncate to `top_n`.
pub fn select_top(mut scored: Vec<ScoredItem>, threshold: f64, top_n: usize) -> Vec<ScoredItem> {
    scored.retain(|s| s.score >= threshold);
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_n);
    scored
}

/// Full ranking pipeline: score → threshold → stable sort → top-N.
/// An empty result is a normal outcome.
pub fn rank(items: Vec<FeedItem>, scorer: &Scorer, threshold: f64, top_n: usize) -> Vec<ScoredItem> {
    select_top(score_items(items, scorer), threshold, top_n)
}
