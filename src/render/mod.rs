//! Read-path rendering: RSS documents and HTML pages built from stored items.

mod html;
mod rss;

use chrono::{DateTime, Utc};

use crate::config::DateSuffix;

pub use html::{render_error_page, render_feed_page, render_feeds_page, FeedSummary};
pub use rss::{render_rss, OWNER_NAME};

/// Append the publish date to a title, e.g. `Title (2024-03-21)`.
pub fn with_date_suffix(title: &str, at: DateTime<Utc>, suffix: DateSuffix) -> String {
    match suffix.format() {
        Some(fmt) => format!("{title} ({})", at.format(fmt)),
        None => title.to_string(),
    }
}

/// Relative time such as `3 minutes ago` or `2 days from now`.
pub fn humanize_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let (secs, suffix) = match delta.num_seconds() {
        s if s < 0 => (-s, "from now"),
        s => (s, "ago"),
    };

    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const WEEK: i64 = 7 * DAY;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let (n, unit) = match secs {
        0 => return "now".to_string(),
        s if s < MINUTE => (s, "second"),
        s if s < HOUR => (s / MINUTE, "minute"),
        s if s < DAY => (s / HOUR, "hour"),
        s if s < WEEK => (s / DAY, "day"),
        s if s < MONTH => (s / WEEK, "week"),
        s if s < YEAR => (s / MONTH, "month"),
        s => (s / YEAR, "year"),
    };

    if n == 1 {
        format!("1 {unit} {suffix}")
    } else {
        format!("{n} {unit}s {suffix}")
    }
}
