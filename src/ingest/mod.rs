// src/ingest/mod.rs
pub mod parse;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub use crate::ingest::parse::parse_feed;
pub use crate::ingest::types::{FeedItem, FetchError};

pub const DEFAULT_USER_AGENT: &str = "feed-curator/0.1";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(12);
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(48 * 3600);
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_fetch_total", "Feed fetches attempted.");
        describe_counter!(
            "feed_fetch_errors_total",
            "Feed fetches that contributed nothing, by error kind."
        );
        describe_counter!("feed_items_parsed_total", "Entries parsed from feeds.");
        describe_counter!(
            "feed_items_kept_total",
            "Entries kept after the lookback filter."
        );
        describe_counter!(
            "feed_items_stale_total",
            "Entries dropped as older than the lookback window."
        );
        describe_histogram!("feed_fetch_ms", "Single feed fetch+parse time in milliseconds.");
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Normalize feed text: strip tags, decode entities, collapse whitespace.
/// Tags go first so escaped text like `&lt;beta&gt;` survives as words.
pub fn normalize_text(s: &str) -> String {
    // 1) Strip HTML tags and comments (a tag name starts right after `<`)
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS
        .get_or_init(|| regex::Regex::new(r"(?is)<!--.*?-->|</?[a-z][^>]*>").unwrap());
    let stripped = re_tags.replace_all(s, " ");

    // 2) HTML entity decode
    let mut out = html_escape::decode_html_entities(&stripped).to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Keep items with no timestamp or with `now - ts <= lookback`.
/// Returns (kept, stale_count).
pub fn filter_recent(
    now: DateTime<Utc>,
    items: Vec<FeedItem>,
    lookback: Duration,
) -> (Vec<FeedItem>, usize) {
    let window = TimeDelta::from_std(lookback).unwrap_or(TimeDelta::MAX);
    let before = items.len();
    let kept: Vec<FeedItem> = items
        .into_iter()
        .filter(|it| match it.published_at {
            None => true,
            Some(ts) => now.signed_duration_since(ts) <= window,
        })
        .collect();
    let stale = before - kept.len();
    (kept, stale)
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Per-feed request timeout.
    pub timeout: Duration,
    /// Maximum entry age.
    pub lookback: Duration,
    /// Upper bound on in-flight fetches.
    pub max_concurrency: usize,
    /// Bound on the whole batch; unfinished feeds are dropped when it elapses.
    pub batch_deadline: Option<Duration>,
    pub user_agent: String,
}

impl FetchOptions {
    pub fn new(timeout: Duration, lookback: Duration) -> Self {
        Self {
            timeout,
            lookback,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            // No overall deadline when twice the timeout does not fit in a Duration.
            batch_deadline: timeout.checked_mul(2),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn with_batch_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.batch_deadline = deadline;
        self
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT, DEFAULT_LOOKBACK)
    }
}

/// Concurrent feed fetcher. Cheap to clone; clones share the HTTP client.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
    opts: FetchOptions,
}

impl FeedFetcher {
    pub fn new(opts: FetchOptions) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(&opts.user_agent)
            .timeout(opts.timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, opts })
    }

    pub fn options(&self) -> &FetchOptions {
        &self.opts
    }

    /// Fetch and parse a single feed. No lookback filtering.
    pub async fn fetch_one(&self, url: &str) -> Result<Vec<FeedItem>, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_request)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp.text().await.map_err(FetchError::from_request)?;
        parse_feed(&body)
    }

    /// Fetch every URL concurrently and return the fresh items, flattened in
    /// URL order. Failing feeds are logged and skipped; this never fails.
    pub async fn fetch_batch(&self, urls: &[String]) -> Vec<FeedItem> {
        ensure_metrics_described();

        let results = self.fetch_all(urls).await;
        let now = Utc::now();

        let mut raw = Vec::new();
        let mut failed = 0usize;
        for (url, res) in urls.iter().zip(results) {
            match res {
                Ok(mut items) => {
                    tracing::debug!(target: "ingest", %url, items = items.len(), "feed fetched");
                    raw.append(&mut items);
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(target: "ingest", %url, error = %e, "feed skipped");
                    counter!("feed_fetch_errors_total", "kind" => e.kind()).increment(1);
                }
            }
        }

        let (kept, stale) = filter_recent(now, raw, self.opts.lookback);

        counter!("feed_items_kept_total").increment(kept.len() as u64);
        counter!("feed_items_stale_total").increment(stale as u64);

        tracing::info!(
            target: "ingest",
            feeds = urls.len(),
            failed,
            kept = kept.len(),
            stale,
            "feed batch done"
        );

        kept
    }

    // Results come back indexed by URL position.
    async fn fetch_all(&self, urls: &[String]) -> Vec<Result<Vec<FeedItem>, FetchError>> {
        let permits = Arc::new(Semaphore::new(self.opts.max_concurrency.max(1)));
        let mut set = JoinSet::new();

        for (idx, url) in urls.iter().cloned().enumerate() {
            let fetcher = self.clone();
            let permits = permits.clone();
            set.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let t0 = Instant::now();
                counter!("feed_fetch_total").increment(1);
                let res = fetcher.fetch_one(&url).await;
                histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                (idx, res)
            });
        }

        let mut slots: Vec<Option<Result<Vec<FeedItem>, FetchError>>> =
            (0..urls.len()).map(|_| None).collect();

        let gather = async {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((idx, res)) => slots[idx] = Some(res),
                    Err(e) => tracing::error!(target: "ingest", error = ?e, "fetch task failed"),
                }
            }
        };

        let deadline_hit = match self.opts.batch_deadline {
            Some(deadline) => tokio::time::timeout(deadline, gather).await.is_err(),
            None => {
                gather.await;
                false
            }
        };
        if deadline_hit {
            tracing::warn!(
                target: "ingest",
                deadline_ms = self.opts.batch_deadline.map(|d| d.as_millis() as u64),
                "batch deadline elapsed; dropping unfinished feeds"
            );
            set.abort_all();
        }

        slots
            .into_iter()
            .map(|slot| match slot {
                Some(res) => res,
                None if deadline_hit => Err(FetchError::DeadlineExceeded),
                None => Err(FetchError::Parse("fetch task did not complete".into())),
            })
            .collect()
    }
}

/// Fetch `urls` with default options apart from `timeout` and `lookback`.
pub async fn fetch_batch(urls: &[String], timeout: Duration, lookback: Duration) -> Vec<FeedItem> {
    match FeedFetcher::new(FetchOptions::new(timeout, lookback)) {
        Ok(fetcher) => fetcher.fetch_batch(urls).await,
        Err(e) => {
            tracing::error!(target: "ingest", error = %e, "cannot build feed fetcher");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, published_at: Option<DateTime<Utc>>) -> FeedItem {
        FeedItem {
            title: title.into(),
            summary: String::new(),
            link: String::new(),
            published_at,
        }
    }

    #[test]
    fn normalize_text_strips_markup() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b>!</p>\n\n&ldquo;quoted&rdquo; ";
        let out = normalize_text(s);
        assert_eq!(out, "Hello, world ! \"quoted\"");
    }

    #[test]
    fn escaped_brackets_are_text_not_tags() {
        let out = normalize_text("Rust 1.80 &lt; 2.0 funding round &gt; expected");
        assert_eq!(out, "Rust 1.80 < 2.0 funding round > expected");

        let out = normalize_text("&lt;b&gt;bold&lt;/b&gt; <!-- hidden --> <i>shown</i>");
        assert_eq!(out, "<b>bold</b> shown");
    }

    #[test]
    fn lookback_excludes_old_and_keeps_undated() {
        let now = Utc::now();
        let items = vec![
            item("fresh", Some(now - TimeDelta::hours(1))),
            item("old", Some(now - TimeDelta::hours(49))),
            item("undated", None),
            item("edge", Some(now - TimeDelta::hours(48))),
        ];
        let (kept, stale) = filter_recent(now, items, Duration::from_secs(48 * 3600));
        let titles: Vec<_> = kept.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["fresh", "undated", "edge"]);
        assert_eq!(stale, 1);
    }

    #[test]
    fn future_timestamps_are_fresh() {
        let now = Utc::now();
        let (kept, _) = filter_recent(
            now,
            vec![item("tomorrow", Some(now + TimeDelta::hours(24)))],
            Duration::from_secs(3600),
        );
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn options_bound_concurrency_and_deadline() {
        let o = FetchOptions::new(Duration::from_secs(5), DEFAULT_LOOKBACK).with_max_concurrency(0);
        assert_eq!(o.max_concurrency, 1);
        assert_eq!(o.batch_deadline, Some(Duration::from_secs(10)));
        assert_eq!(o.user_agent, DEFAULT_USER_AGENT);

        let huge = FetchOptions::new(Duration::MAX, DEFAULT_LOOKBACK);
        assert_eq!(huge.batch_deadline, None);
    }
}
