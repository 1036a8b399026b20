use chrono::{TimeZone, Utc};
use feed_curator::ingest::parse::{parse_feed, sniff_format, FeedFormat};

const RSS2: &str = include_str!("fixtures/rss2.xml");
const ATOM: &str = include_str!("fixtures/atom.xml");
const RDF: &str = include_str!("fixtures/rdf.xml");
const PODCAST: &str = include_str!("fixtures/podcast.xml");

#[test]
fn rss2_fixture_maps_every_item() {
    assert_eq!(sniff_format(RSS2).unwrap(), FeedFormat::Rss);
    let items = parse_feed(RSS2).expect("rss2 parses");
    assert_eq!(items.len(), 3, "one FeedItem per <item>, in document order");

    let first = &items[0];
    assert_eq!(first.title, "New AI model tops & beats benchmarks");
    assert_eq!(first.summary, "The model was trained on \"open\" data.");
    assert_eq!(first.link, "https://news.example.com/ai-model");
    assert_eq!(
        first.published_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    );

    // permalink guid stands in for <link>; content:encoded for <description>
    let second = &items[1];
    assert_eq!(second.link, "https://news.example.com/series-a");
    assert_eq!(second.summary, "Raised $12M to build developer tools.");
    assert_eq!(
        second.published_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 2, 8, 30, 0).unwrap())
    );

    let third = &items[2];
    assert_eq!(third.link, "https://news.example.com/fundamentals");
    assert!(third.published_at.is_none());
}

#[test]
fn atom_fixture_prefers_alternate_link_and_published() {
    assert_eq!(sniff_format(ATOM).unwrap(), FeedFormat::Atom);
    let items = parse_feed(ATOM).expect("atom parses");
    assert_eq!(items.len(), 2);

    assert_eq!(items[0].title, "Rust <3 async");
    assert_eq!(items[0].link, "https://blog.example.com/rust-async");
    assert_eq!(items[0].summary, "Structured concurrency with Tokio.");
    assert_eq!(
        items[0].published_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap())
    );

    // no <published>: <updated> is used, normalized to UTC
    assert_eq!(items[1].link, "https://blog.example.com/only-updated");
    assert_eq!(items[1].summary, "Body from content.");
    assert_eq!(
        items[1].published_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 3, 5, 15, 0).unwrap())
    );
}

#[test]
fn rdf_fixture_reads_items_beside_channel() {
    assert_eq!(sniff_format(RDF).unwrap(), FeedFormat::Rdf);
    let items = parse_feed(RDF).expect("rdf parses");
    let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, ["Kernel release notes", "Undated entry"]);
    assert_eq!(
        items[0].published_at,
        Some(Utc.with_ymd_and_hms(2024, 2, 28, 18, 0, 0).unwrap())
    );
    assert!(items[1].published_at.is_none());
    assert_eq!(items[1].summary, "");
}

#[test]
fn namespaced_extensions_do_not_break_items() {
    // itunes:title, media:description and atom:link share local names with
    // core RSS elements; every item must still come through.
    let items = parse_feed(PODCAST).expect("podcast feed parses");
    assert_eq!(items.len(), 3);

    assert_eq!(items[0].title, "Episode 12: AI funding roundup");
    assert_eq!(items[0].link, "https://pod.example.com/ep12");
    assert_eq!(
        items[0].published_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap())
    );

    assert_eq!(items[1].title, "Episode 11: Rust in production");
    assert_eq!(items[1].summary, "Interview about async services.");

    assert_eq!(items[2].title, "Episode 10: Open source licensing");
    assert_eq!(items[2].link, "https://pod.example.com/ep10");
    assert_eq!(items[2].summary, "What changed this year.");
}

#[test]
fn escaped_angle_brackets_keep_their_words() {
    let xml = r#"<rss version="2.0"><channel><title>t</title>
<item><title>Rust 1.80 &amp;lt; 2.0 funding round &amp;gt; expected</title><link>https://x.example/a</link></item>
</channel></rss>"#;
    let items = parse_feed(xml).unwrap();
    assert_eq!(items[0].title, "Rust 1.80 < 2.0 funding round > expected");
}

#[test]
fn html_page_is_not_a_feed() {
    let err = parse_feed("<!DOCTYPE html><html><head></head></html>").unwrap_err();
    assert_eq!(err.kind(), "format");
}
