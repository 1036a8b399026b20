//! Rule file loading (`config/rules.toml` or `config/rules.json`).
//!
//! Document shape:
//! ```toml
//! threshold = 3.0   # optional, default 3.0
//! top_n = 5         # optional, default 5
//!
//! [weights]
//! "ai" = 2.0
//! 're:\bfund(ing|ed)\b' = 1.5
//! ```
//!
//! A missing file yields an empty rule set with default threshold/top_n.
//! A present but malformed file is an error.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::analyze::rank::{rank, ScoredItem};
use crate::analyze::scoring::Scorer;
use crate::ingest::FeedItem;

pub const DEFAULT_THRESHOLD: f64 = 3.0;
pub const DEFAULT_TOP_N: usize = 5;

pub const DEFAULT_RULES_PATH: &str = "config/rules.toml";
pub const FALLBACK_RULES_PATH: &str = "config/rules.json";
pub const ENV_RULES_PATH: &str = "FEED_CURATOR_RULES_PATH";

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("reading rules from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing TOML rules: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("parsing JSON rules: {0}")]
    Json(#[from] serde_json::Error),

    #[error("weight for `{key}` must be a finite number")]
    BadWeight { key: String },

    #[error("threshold must be a finite number")]
    BadThreshold,

    #[error("rule `{key}` is not a valid regex: {source}")]
    Regex {
        key: String,
        #[source]
        source: regex::Error,
    },
}

/// Weights in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weights(pub Vec<(String, f64)>);

impl<'de> Deserialize<'de> for Weights {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = Weights;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of rule keys to numeric weights")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Weights, A::Error> {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((k, v)) = map.next_entry::<String, f64>()? {
                    out.push((k, v));
                }
                Ok(Weights(out))
            }
        }

        de.deserialize_map(OrderedVisitor)
    }
}

/// Raw, uncompiled rule document.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RuleFile {
    #[serde(default)]
    pub weights: Weights,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl Default for RuleFile {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            threshold: DEFAULT_THRESHOLD,
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// Compiled rules, ready for scoring. Read-only for the duration of a scan.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub scorer: Scorer,
    pub threshold: f64,
    pub top_n: usize,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            scorer: Scorer::default(),
            threshold: DEFAULT_THRESHOLD,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl RuleSet {
    pub fn compile(file: RuleFile) -> Result<Self, RuleError> {
        if !file.threshold.is_finite() {
            return Err(RuleError::BadThreshold);
        }
        Ok(Self {
            scorer: Scorer::new(file.weights.0)?,
            threshold: file.threshold,
            top_n: file.top_n,
        })
    }

    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, RuleError> {
        Self::compile(parse_rules(s, "toml")?)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, RuleError> {
        Self::compile(parse_rules(s, "json")?)
    }

    /// Score, filter, sort and truncate with this rule set's threshold/top_n.
    pub fn rank(&self, items: Vec<FeedItem>) -> Vec<ScoredItem> {
        rank(items, &self.scorer, self.threshold, self.top_n)
    }
}

/// Parse a rule document; `.json` selects JSON, anything else TOML.
pub fn parse_rules(s: &str, hint_ext: &str) -> Result<RuleFile, RuleError> {
    if hint_ext.eq_ignore_ascii_case("json") {
        Ok(serde_json::from_str(s)?)
    } else {
        Ok(toml::from_str(s)?)
    }
}

/// Load rules from an explicit path. Missing file means defaults.
pub fn load_rules_from(path: &Path) -> Result<RuleSet, RuleError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no rule file; using empty rule set");
            return Ok(RuleSet::default());
        }
        Err(source) => {
            return Err(RuleError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let rules = RuleSet::compile(parse_rules(&content, &ext)?)?;
    tracing::debug!(
        path = %path.display(),
        rules = rules.scorer.len(),
        threshold = rules.threshold,
        top_n = rules.top_n,
        "rules loaded"
    );
    Ok(rules)
}

/// Resolve the rule file path:
/// 1) $FEED_CURATOR_RULES_PATH
/// 2) config/rules.toml
/// 3) config/rules.json
///
/// When nothing exists the TOML default is returned (and loads as defaults).
pub fn resolve_rules_path() -> PathBuf {
    if let Ok(p) = std::env::var(ENV_RULES_PATH) {
        return PathBuf::from(p);
    }
    let toml_p = PathBuf::from(DEFAULT_RULES_PATH);
    if toml_p.exists() {
        return toml_p;
    }
    let json_p = PathBuf::from(FALLBACK_RULES_PATH);
    if json_p.exists() {
        return json_p;
    }
    toml_p
}

/// Load rules using env var + fallbacks.
pub fn load_rules_default() -> Result<RuleSet, RuleError> {
    load_rules_from(&resolve_rules_path())
}
