// src/ingest/parse.rs
//! Syndication parsing for RSS 2.0, RSS 1.0 (RDF) and Atom.
//!
//! The root element is checked first so non-feed documents get a clear
//! error; the document itself is parsed with `feed-rs`, which tolerates
//! namespaced extensions (`itunes:`, `media:`, `atom:`, `dc:`) next to the
//! core elements. Timestamps prefer "published" and fall back to "updated".

use feed_rs::model::Entry;
use metrics::{counter, histogram};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::ingest::normalize_text;
use crate::ingest::types::{FeedItem, FetchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Rdf,
    Atom,
}

/// Detect the feed format from the first element of the document.
pub fn sniff_format(xml: &str) -> Result<FeedFormat, FetchError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.local_name();
                return match name.as_ref() {
                    b"rss" => Ok(FeedFormat::Rss),
                    b"RDF" => Ok(FeedFormat::Rdf),
                    b"feed" => Ok(FeedFormat::Atom),
                    other => Err(FetchError::UnsupportedFormat(
                        String::from_utf8_lossy(other).into_owned(),
                    )),
                };
            }
            Ok(Event::Eof) => return Err(FetchError::Parse("empty document".into())),
            Ok(_) => continue,
            Err(e) => return Err(FetchError::Parse(e.to_string())),
        }
    }
}

/// Parse a feed document into items, in document order.
pub fn parse_feed(body: &str) -> Result<Vec<FeedItem>, FetchError> {
    let t0 = std::time::Instant::now();
    let xml = body.trim_start_matches('\u{feff}').trim_start();

    let format = sniff_format(xml)?;
    let feed = feed_rs::parser::parse(xml.as_bytes())
        .map_err(|e| FetchError::Parse(format!("{format:?}: {e}")))?;
    let items: Vec<FeedItem> = feed.entries.into_iter().map(entry_to_item).collect();

    histogram!("feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("feed_items_parsed_total").increment(items.len() as u64);
    Ok(items)
}

fn entry_to_item(entry: Entry) -> FeedItem {
    // rel="alternate" or no rel is the page itself; self/enclosure/related are not.
    let link = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
        // A permalink guid is the only link some RSS items carry.
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.trim().to_string()))
        .unwrap_or_default();

    let summary = entry
        .summary
        .map(|t| t.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();

    FeedItem {
        title: normalize_text(&entry.title.map(|t| t.content).unwrap_or_default()),
        summary: normalize_text(&summary),
        link,
        published_at: entry.published.or(entry.updated),
    }
}
