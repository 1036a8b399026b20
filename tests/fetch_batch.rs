use std::time::Duration;

use chrono::{TimeDelta, Utc};
use feed_curator::ingest::{fetch_batch, FeedFetcher, FetchError, FetchOptions};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOOKBACK: Duration = Duration::from_secs(48 * 3600);

/// RSS 2.0 body whose items are `(title, hours_ago)`; `None` means no pubDate.
fn rss(items: &[(&str, Option<i64>)]) -> String {
    let now = Utc::now();
    let body: String = items
        .iter()
        .map(|(title, age)| {
            let date = age
                .map(|h| format!("<pubDate>{}</pubDate>", (now - TimeDelta::hours(h)).to_rfc2822()))
                .unwrap_or_default();
            format!("<item><title>{title}</title><link>https://x.example/{title}</link>{date}</item>")
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>{body}</channel></rss>"#)
}

async fn mount_xml(server: &MockServer, at: &str, xml: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_raw(xml, "application/rss+xml"))
        .mount(server)
        .await;
}

fn titles(items: &[feed_curator::FeedItem]) -> Vec<&str> {
    items.iter().map(|i| i.title.as_str()).collect()
}

#[tokio::test]
async fn slow_feed_is_skipped_and_others_survive() {
    let server = MockServer::start().await;
    mount_xml(&server, "/a", rss(&[("a1", Some(1)), ("a2", None)])).await;
    mount_xml(&server, "/c", rss(&[("c1", Some(2))])).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(rss(&[("never", Some(1))]), "application/rss+xml")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let urls = vec![
        format!("{}/a", server.uri()),
        format!("{}/slow", server.uri()),
        format!("{}/c", server.uri()),
    ];
    let started = std::time::Instant::now();
    let items = fetch_batch(&urls, Duration::from_secs(1), LOOKBACK).await;

    assert_eq!(titles(&items), ["a1", "a2", "c1"], "URL order, slow feed dropped");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn http_errors_and_garbage_contribute_nothing() {
    let server = MockServer::start().await;
    mount_xml(&server, "/ok", rss(&[("ok1", Some(3))])).await;
    Mock::given(method("GET"))
        .and(path("/500"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>nope</body></html>"))
        .mount(&server)
        .await;
    mount_xml(&server, "/broken", "<rss><channel><item><title>x</item>".to_string()).await;

    let urls: Vec<String> = ["/500", "/html", "/ok", "/broken", "/missing"]
        .iter()
        .map(|p| format!("{}{p}", server.uri()))
        .collect();
    let items = fetch_batch(&urls, Duration::from_secs(2), LOOKBACK).await;
    assert_eq!(titles(&items), ["ok1"]);
}

#[tokio::test]
async fn lookback_drops_old_entries_keeps_undated() {
    let server = MockServer::start().await;
    mount_xml(
        &server,
        "/feed",
        rss(&[("new", Some(1)), ("old", Some(49)), ("undated", None), ("older", Some(24 * 30))]),
    )
    .await;

    let urls = vec![format!("{}/feed", server.uri())];
    let items = fetch_batch(&urls, Duration::from_secs(2), LOOKBACK).await;
    assert_eq!(titles(&items), ["new", "undated"]);
}

#[tokio::test]
async fn empty_url_list_is_empty_result() {
    let items = fetch_batch(&[], Duration::from_secs(1), LOOKBACK).await;
    assert!(items.is_empty());
}

#[tokio::test]
async fn fetch_one_reports_typed_errors_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(header("user-agent", "feed-curator/0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(rss(&[("hi", None)]), "text/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = FeedFetcher::new(FetchOptions::new(Duration::from_secs(2), LOOKBACK)).unwrap();
    let items = fetcher.fetch_one(&format!("{}/ua", server.uri())).await.unwrap();
    assert_eq!(titles(&items), ["hi"]);

    let err = fetcher.fetch_one(&format!("{}/gone", server.uri())).await.unwrap_err();
    assert!(matches!(err, FetchError::Status(404)));
}

#[tokio::test]
async fn batch_deadline_bounds_total_latency() {
    let server = MockServer::start().await;
    mount_xml(&server, "/fast", rss(&[("fast", None)])).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(rss(&[("slow", None)]), "text/xml")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    // per-feed timeout alone would wait 10s for /slow
    let opts = FetchOptions::new(Duration::from_secs(10), LOOKBACK)
        .with_batch_deadline(Some(Duration::from_millis(500)));
    let fetcher = FeedFetcher::new(opts).unwrap();

    let urls = vec![format!("{}/fast", server.uri()), format!("{}/slow", server.uri())];
    let started = std::time::Instant::now();
    let items = fetcher.fetch_batch(&urls).await;

    assert_eq!(titles(&items), ["fast"]);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn concurrency_limit_of_one_still_fetches_everything() {
    let server = MockServer::start().await;
    for i in 0..5 {
        let title = format!("item{i}");
        mount_xml(&server, &format!("/f{i}"), rss(&[(title.as_str(), None)])).await;
    }
    let opts = FetchOptions::new(Duration::from_secs(2), LOOKBACK).with_max_concurrency(1);
    let fetcher = FeedFetcher::new(opts).unwrap();

    let urls: Vec<String> = (0..5).map(|i| format!("{}/f{i}", server.uri())).collect();
    let items = fetcher.fetch_batch(&urls).await;
    assert_eq!(titles(&items), ["item0", "item1", "item2", "item3", "item4"]);
}

#[tokio::test]
async fn in_flight_fetches_never_exceed_the_limit() {
    let server = MockServer::start().await;
    for i in 0..4 {
        Mock::given(method("GET"))
            .and(path(format!("/d{i}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(rss(&[(format!("d{i}").as_str(), None)]), "application/rss+xml")
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
    }
    let urls: Vec<String> = (0..4).map(|i| format!("{}/d{i}", server.uri())).collect();

    // Two at a time means two rounds of the 300ms delay.
    let opts = FetchOptions::new(Duration::from_secs(5), LOOKBACK).with_max_concurrency(2);
    let fetcher = FeedFetcher::new(opts).unwrap();
    let started = std::time::Instant::now();
    let items = fetcher.fetch_batch(&urls).await;
    let limited = started.elapsed();
    assert_eq!(titles(&items), ["d0", "d1", "d2", "d3"]);
    assert!(limited >= Duration::from_millis(580), "took {limited:?}");

    // One at a time means four rounds.
    let opts = FetchOptions::new(Duration::from_secs(5), LOOKBACK).with_max_concurrency(1);
    let fetcher = FeedFetcher::new(opts).unwrap();
    let started = std::time::Instant::now();
    let items = fetcher.fetch_batch(&urls).await;
    let serial = started.elapsed();
    assert_eq!(items.len(), 4);
    assert!(serial >= Duration::from_millis(1180), "took {serial:?}");
}
