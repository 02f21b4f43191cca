//! Source fetching and parsing.

use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use super::{Enclosure, FeedMeta, Item, ParsedFeed};
use crate::config::FetchConfig;
use crate::{FeedhubError, Result};

const USER_AGENT: &str = concat!("feedhub/", env!("CARGO_PKG_VERSION"));

/// Capability to fetch one source URL into a parsed feed.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed>;
}

/// HTTP fetcher backed by reqwest and feed-rs.
pub struct HttpFetcher {
    client: Client,
    max_size: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedhubError::Fetch(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_size: config.max_feed_size_bytes,
        })
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedhubError::Fetch(format!("failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(FeedhubError::Fetch(format!(
                "HTTP error from {url}: {}",
                response.status()
            )));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_size {
                return Err(FeedhubError::Fetch(format!(
                    "feed too large: {len} bytes (max {} bytes)",
                    self.max_size
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedhubError::Fetch(format!("failed to read {url}: {e}")))?;

        if bytes.len() as u64 > self.max_size {
            return Err(FeedhubError::Fetch(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_size
            )));
        }

        let feed = parse_feed(&bytes)?;
        debug!(url, items = feed.items.len(), "fetched source");
        Ok(feed)
    }
}

/// Parse RSS or Atom bytes.
///
/// Entries without any publish or update time are dropped.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::parse(bytes)
        .map_err(|e| FeedhubError::Fetch(format!("failed to parse feed: {e}")))?;

    let meta = FeedMeta {
        title: feed.title.map(|t| t.content).unwrap_or_default(),
        description: feed.description.map(|d| d.content).unwrap_or_default(),
        link: feed.links.first().map(|l| l.href.clone()).unwrap_or_default(),
    };

    let items = feed.entries.into_iter().filter_map(convert_entry).collect();

    Ok(ParsedFeed { meta, items })
}

fn convert_entry(entry: Entry) -> Option<Item> {
    let published_at = entry.published.or(entry.updated)?;
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();
    let guid = if entry.id.is_empty() {
        link.clone()
    } else {
        entry.id
    };
    if guid.is_empty() {
        return None;
    }

    let mut enclosure = None;
    let mut duration = None;
    for media in &entry.media {
        if duration.is_none() {
            duration = media
                .duration
                .or_else(|| media.content.iter().find_map(|c| c.duration))
                .map(|d| d.as_secs().to_string());
        }
        if enclosure.is_none() {
            enclosure = media.content.iter().find_map(|c| {
                c.url.as_ref().map(|url| Enclosure {
                    url: url.to_string(),
                    length: c.size.map(|s| s as i64).unwrap_or(0),
                    content_type: c
                        .content_type
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_default(),
                })
            });
        }
    }

    Some(Item {
        guid,
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        link,
        description: entry.summary.map(|t| t.content).unwrap_or_default(),
        content: entry.content.and_then(|c| c.body),
        pub_date: published_at.to_rfc2822(),
        published_at,
        author: entry.authors.first().map(|a| a.name.clone()),
        enclosure,
        duration,
        junk: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PODCAST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Test Podcast</title>
    <link>https://example.com</link>
    <description>A test podcast</description>
    <item>
      <title>Episode 2</title>
      <link>https://example.com/2</link>
      <guid>ep-2</guid>
      <description>&lt;p&gt;Second&lt;/p&gt;</description>
      <pubDate>Thu, 21 Mar 2024 10:30:00 +0000</pubDate>
      <enclosure url="https://example.com/2.mp3" length="12345" type="audio/mpeg"/>
    </item>
    <item>
      <title>Episode 1</title>
      <link>https://example.com/1</link>
      <guid>ep-1</guid>
      <pubDate>Wed, 20 Mar 2024 10:30:00 +0000</pubDate>
    </item>
    <item>
      <title>Undated</title>
      <guid>ep-0</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_rss() {
        let feed = parse_feed(PODCAST.as_bytes()).unwrap();
        assert_eq!(feed.meta.title, "Test Podcast");
        assert_eq!(feed.meta.description, "A test podcast");
        assert!(feed.meta.link.starts_with("https://example.com"));

        assert_eq!(feed.items.len(), 2);
        let first = &feed.items[0];
        assert_eq!(first.guid, "ep-2");
        assert_eq!(first.title, "Episode 2");
        assert_eq!(first.link, "https://example.com/2");
        assert_eq!(first.description, "<p>Second</p>");
        assert_eq!(first.pub_date, "Thu, 21 Mar 2024 10:30:00 +0000");

        let enclosure = first.enclosure.as_ref().unwrap();
        assert_eq!(enclosure.url, "https://example.com/2.mp3");
        assert_eq!(enclosure.content_type, "audio/mpeg");

        assert_eq!(feed.items[1].guid, "ep-1");
        assert!(feed.items[1].enclosure.is_none());
    }

    #[test]
    fn test_parse_feed_atom() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <link href="https://example.com"/>
  <entry>
    <id>urn:uuid:1</id>
    <title>Atom Entry</title>
    <link href="https://example.com/entry"/>
    <summary>Entry summary</summary>
    <author><name>Author Name</name></author>
    <updated>2025-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let feed = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(feed.meta.title, "Atom Feed");
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].guid, "urn:uuid:1");
        assert_eq!(feed.items[0].author.as_deref(), Some("Author Name"));
        assert_eq!(feed.items[0].description, "Entry summary");
    }

    #[test]
    fn test_parse_feed_invalid() {
        assert!(matches!(
            parse_feed(b"This is not XML"),
            Err(FeedhubError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_http_fetcher_status_error() {
        use axum::{http::StatusCode, routing::get, Router};

        let app = Router::new()
            .route("/ok", get(|| async { PODCAST }))
            .route("/gone", get(|| async { StatusCode::GONE }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();

        let feed = fetcher.fetch(&format!("http://{addr}/ok")).await.unwrap();
        assert_eq!(feed.items.len(), 2);

        let err = fetcher
            .fetch(&format!("http://{addr}/gone"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("410"));
    }

    #[tokio::test]
    async fn test_http_fetcher_size_limit() {
        use axum::{routing::get, Router};

        let app = Router::new().route("/big", get(|| async { PODCAST }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let config = FetchConfig {
            max_feed_size_bytes: 64,
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher
            .fetch(&format!("http://{addr}/big"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
