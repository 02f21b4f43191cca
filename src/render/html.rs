//! HTML pages rendered through the template engine.

use chrono::{DateTime, Utc};

use super::humanize_since;
use crate::config::FeedConfig;
use crate::feed::Item;
use crate::template::{TemplateContext, TemplateEngine, Value};
use crate::{FeedhubError, Result};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// One row of the feeds index page.
#[derive(Debug, Clone)]
pub struct FeedSummary {
    pub name: String,
    pub title: String,
    pub description: String,
    pub last_updated: DateTime<Utc>,
    pub sources: usize,
}

/// Page of a single feed listing every stored item, junk included.
pub fn render_feed_page(
    engine: &TemplateEngine,
    name: &str,
    feed: &FeedConfig,
    base_url: &str,
    items: &[Item],
    now: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let newest = items
        .first()
        .ok_or_else(|| FeedhubError::Render(format!("no items in feed {name}")))?;
    let base_url = base_url.trim_end_matches('/');

    let mut ctx = TemplateContext::new();
    ctx.set("name", Value::string(name));
    ctx.set("title", Value::string(&feed.title));
    ctx.set("description", Value::string(&feed.description));
    ctx.set("link", Value::string(&feed.link));
    ctx.set(
        "last_update",
        Value::string(newest.published_at.format(TIME_FORMAT).to_string()),
    );
    ctx.set(
        "since_last_update",
        Value::string(humanize_since(newest.published_at, now)),
    );
    ctx.set("sources", Value::from(feed.sources.len()));
    ctx.set("rss_link", Value::string(format!("{base_url}/rss/{name}")));
    ctx.set("telegram_channel", Value::string(&feed.telegram_channel));
    ctx.set(
        "items",
        Value::List(items.iter().map(item_value).collect()),
    );

    Ok(engine.render("feed.html", &ctx)?.into_bytes())
}

fn item_value(item: &Item) -> Value {
    Value::object([
        ("guid", Value::string(&item.guid)),
        ("title", Value::string(&item.title)),
        ("link", Value::string(&item.link)),
        ("description", Value::string(&item.description)),
        ("pub_date", Value::string(&item.pub_date)),
        ("author", Value::from(item.author.clone())),
        ("duration_fmt", Value::from(item.duration_fmt())),
        (
            "enclosure_url",
            Value::from(item.enclosure.as_ref().map(|e| e.url.clone())),
        ),
        ("junk", Value::Bool(item.junk)),
    ])
}

/// Index page of all feeds that have stored items.
pub fn render_feeds_page(
    engine: &TemplateEngine,
    base_url: &str,
    feeds: &[FeedSummary],
) -> Result<Vec<u8>> {
    let base_url = base_url.trim_end_matches('/');
    let rows = feeds
        .iter()
        .map(|f| {
            Value::object([
                ("name", Value::string(&f.name)),
                ("title", Value::string(&f.title)),
                ("description", Value::string(&f.description)),
                ("feed_url", Value::string(format!("{base_url}/feed/{}", f.name))),
                ("rss_url", Value::string(format!("{base_url}/rss/{}", f.name))),
                (
                    "last_updated",
                    Value::string(f.last_updated.format(TIME_FORMAT).to_string()),
                ),
                ("sources", Value::from(f.sources)),
            ])
        })
        .collect();

    let mut ctx = TemplateContext::new();
    ctx.set("feeds", Value::List(rows));
    ctx.set("feeds_count", Value::from(feeds.len()));

    Ok(engine.render("feeds.html", &ctx)?.into_bytes())
}

/// Error page with the status code and message.
pub fn render_error_page(engine: &TemplateEngine, status: u16, message: &str) -> Result<String> {
    let mut ctx = TemplateContext::new();
    ctx.set("status", Value::from(i64::from(status)));
    ctx.set("message", Value::string(message));
    Ok(engine.render("error.html", &ctx)?)
}
