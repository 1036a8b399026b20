// src/ingest/types.rs
use chrono::{DateTime, Utc};

/// One entry pulled out of a feed. Title and summary are already normalized.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>, // published, else updated
}

impl FeedItem {
    /// Text the scorer sees: title and summary on separate lines.
    pub fn scoring_text(&self) -> String {
        format!("{}\n{}", self.title, self.summary)
    }
}

/// Why a single feed contributed nothing to a batch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("document is not an RSS or Atom feed (root element `{0}`)")]
    UnsupportedFormat(String),

    #[error("batch deadline elapsed before the feed finished")]
    DeadlineExceeded,
}

impl FetchError {
    /// Classify a reqwest error, separating out timeouts.
    pub fn from_request(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(e)
        }
    }

    /// Short label used as a metrics tag.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Client(_) => "client",
            FetchError::Timeout => "timeout",
            FetchError::Http(_) => "http",
            FetchError::Status(_) => "status",
            FetchError::Parse(_) => "parse",
            FetchError::UnsupportedFormat(_) => "format",
            FetchError::DeadlineExceeded => "deadline",
        }
    }
}
