//! Keyword/regex scorer.
//!
//! Each rule is a lowercase key with a weight. Keys starting with `re:` are
//! regular expressions (searched case-insensitively); all other keys are
//! literal substrings. The score of a text is the sum of the weights of the
//! rules that match it, and the reasons are the matching keys in rule order.

use regex::{Regex, RegexBuilder};

use crate::analyze::rules::RuleError;

/// Prefix marking a rule key as a regular expression.
pub const REGEX_MARKER: &str = "re:";

#[derive(Debug, Clone)]
pub enum RuleKind {
    Literal(String),
    Regex(Regex),
}

#[derive(Debug, Clone)]
pub struct Rule {
    /// Lowercased key; reported as the match reason.
    pub key: String,
    pub kind: RuleKind,
    pub weight: f64,
}

impl Rule {
    pub fn new(raw_key: &str, weight: f64) -> Result<Self, RuleError> {
        let key = raw_key.to_lowercase();
        if !weight.is_finite() {
            return Err(RuleError::BadWeight { key });
        }

        let is_regex = raw_key
            .get(..REGEX_MARKER.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(REGEX_MARKER));

        let kind = if is_regex {
            // Compile from the raw pattern so classes like \S or \W keep their meaning.
            let pattern = &raw_key[REGEX_MARKER.len()..];
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| RuleError::Regex {
                    key: key.clone(),
                    source,
                })?;
            RuleKind::Regex(re)
        } else {
            RuleKind::Literal(key.clone())
        };

        Ok(Self { key, kind, weight })
    }

    /// `lowered` must already be lowercased.
    pub fn matches(&self, lowered: &str) -> bool {
        match &self.kind {
            RuleKind::Literal(needle) => lowered.contains(needle.as_str()),
            RuleKind::Regex(re) => re.is_match(lowered),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    rules: Vec<Rule>,
}

impl Scorer {
    /// Build from `(key, weight)` pairs in order. Keys equal after lowercasing
    /// collapse into one rule at the first position with the last weight.
    pub fn new<I, K>(weights: I) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut rules: Vec<Rule> = Vec::new();
        for (k, w) in weights {
            let rule = Rule::new(k.as_ref(), w)?;
            match rules.iter_mut().find(|r| r.key == rule.key) {
                Some(slot) => *slot = rule,
                None => rules.push(rule),
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Sum of matched weights and the matched keys, in rule order.
    pub fn score(&self, text: &str) -> (f64, Vec<String>) {
        let lowered = text.to_lowercase();

        let mut score = 0.0;
        let mut reasons = Vec::new();
        for rule in &self.rules {
            if rule.matches(&lowered) {
                score += rule.weight;
                reasons.push(rule.key.clone());
            }
        }
        (score, reasons)
    }
}
