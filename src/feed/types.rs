//! Feed item types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Media reference attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enclosure {
    pub url: String,
    /// Length in bytes as announced by the source.
    pub length: i64,
    /// MIME type.
    pub content_type: String,
}

/// One feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    /// Stable identifier, unique within a feed.
    pub guid: String,
    pub title: String,
    pub link: String,
    /// HTML description.
    pub description: String,
    /// Optional HTML body.
    pub content: Option<String>,
    /// Publish time as it is re-serialized (RFC 2822).
    pub pub_date: String,
    /// Structured publish time.
    pub published_at: DateTime<Utc>,
    pub author: Option<String>,
    pub enclosure: Option<Enclosure>,
    /// Duration in seconds, as a string.
    pub duration: Option<String>,
    /// Set when the item matched its feed's filter.
    pub junk: bool,
}

impl Item {
    /// Create an item with the required fields; `pub_date` is derived from
    /// `published_at`.
    pub fn new(
        guid: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            guid: guid.into(),
            title: title.into(),
            link: link.into(),
            description: String::new(),
            content: None,
            pub_date: published_at.to_rfc2822(),
            published_at,
            author: None,
            enclosure: None,
            duration: None,
            junk: false,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the enclosure.
    pub fn with_enclosure(mut self, enclosure: Enclosure) -> Self {
        self.enclosure = Some(enclosure);
        self
    }

    /// Set the duration in seconds.
    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration = Some(secs.to_string());
        self
    }

    /// Human-formatted duration, e.g. `1h2m3s`. Display only.
    pub fn duration_fmt(&self) -> Option<String> {
        let secs = self.duration.as_deref()?.trim().parse::<u64>().ok()?;
        Some(format_duration(secs))
    }
}

/// Format seconds as hours, minutes and seconds (`45s`, `2m0s`, `1h2m3s`).
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}

/// Feed-level metadata of a fetched source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedMeta {
    pub title: String,
    pub description: String,
    pub link: String,
}

/// A fetched and parsed source.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub meta: FeedMeta,
    /// Entries in the order the source lists them.
    pub items: Vec<Item>,
}
