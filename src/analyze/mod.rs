// src/analyze/mod.rs
//! Scoring and ranking: rule file → compiled scorer → ranked items.

pub mod rank;
pub mod rules;
pub mod scoring;

// Re-export convenient types.
pub use crate::analyze::rank::{rank, score_items, select_top, ScoredItem};
pub use crate::analyze::rules::{
    load_rules_default, load_rules_from, RuleError, RuleFile, RuleSet, Weights,
};
pub use crate::analyze::scoring::{Rule, RuleKind, Scorer, REGEX_MARKER};
