//! Per-feed item history.

use chrono::{DateTime, Utc};

use crate::db::DbPool;
use crate::feed::{Enclosure, Item};
use crate::{FeedhubError, Result};

/// Row type for a stored item.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ItemRow {
    guid: String,
    title: String,
    link: String,
    description: String,
    content: Option<String>,
    pub_date: String,
    published_at: i64,
    author: Option<String>,
    duration: Option<String>,
    enclosure_url: Option<String>,
    enclosure_length: Option<i64>,
    enclosure_type: Option<String>,
    junk: bool,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        let enclosure = row.enclosure_url.map(|url| Enclosure {
            url,
            length: row.enclosure_length.unwrap_or(0),
            content_type: row.enclosure_type.unwrap_or_default(),
        });
        Item {
            guid: row.guid,
            title: row.title,
            link: row.link,
            description: row.description,
            content: row.content,
            pub_date: row.pub_date,
            published_at: DateTime::from_timestamp(row.published_at, 0).unwrap_or_default(),
            author: row.author,
            enclosure,
            duration: row.duration,
            junk: row.junk,
        }
    }
}

const ITEM_COLUMNS: &str = "guid, title, link, description, content, pub_date, published_at, \
     author, duration, enclosure_url, enclosure_length, enclosure_type, junk";

/// Repository for feed item history.
///
/// `(feed_name, guid)` is unique, so concurrent saves of the same item
/// resolve inside SQLite: exactly one of them inserts.
pub struct ItemRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ItemRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Save an item unless the feed already has one with the same GUID.
    ///
    /// Returns `true` when the item was inserted.
    pub async fn save(&self, feed_name: &str, item: &Item) -> Result<bool> {
        let enclosure = item.enclosure.as_ref();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO feed_items
                (feed_name, guid, title, link, description, content, pub_date, published_at,
                 author, duration, enclosure_url, enclosure_length, enclosure_type, junk)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(feed_name)
        .bind(&item.guid)
        .bind(&item.title)
        .bind(&item.link)
        .bind(&item.description)
        .bind(&item.content)
        .bind(&item.pub_date)
        .bind(item.published_at.timestamp())
        .bind(&item.author)
        .bind(&item.duration)
        .bind(enclosure.map(|e| e.url.as_str()))
        .bind(enclosure.map(|e| e.length))
        .bind(enclosure.map(|e| e.content_type.as_str()))
        .bind(item.junk)
        .execute(self.pool)
        .await
        .map_err(|e| FeedhubError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Load up to `max` items of a feed, newest first.
    ///
    /// Junk items are left out when `skip_junk` is set. A feed with no
    /// stored items at all is reported as `NotFound`.
    pub async fn load(&self, feed_name: &str, max: usize, skip_junk: bool) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM feed_items
             WHERE feed_name = ? AND (? = 0 OR junk = 0)
             ORDER BY published_at DESC, id DESC
             LIMIT ?"
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(feed_name)
            .bind(skip_junk)
            .bind(max as i64)
            .fetch_all(self.pool)
            .await
            .map_err(|e| FeedhubError::Database(e.to_string()))?;

        if rows.is_empty() && self.count(feed_name).await? == 0 {
            return Err(FeedhubError::NotFound(format!("feed {feed_name}")));
        }

        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Delete everything but the `keep` most recent items of a feed.
    ///
    /// Returns the number of deleted items.
    pub async fn remove_old(&self, feed_name: &str, keep: usize) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM feed_items
            WHERE feed_name = ?
            AND id NOT IN (
                SELECT id FROM feed_items
                WHERE feed_name = ?
                ORDER BY published_at DESC, id DESC
                LIMIT ?
            )
            "#,
        )
        .bind(feed_name)
        .bind(feed_name)
        .bind(keep as i64)
        .execute(self.pool)
        .await
        .map_err(|e| FeedhubError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Count stored items of a feed, junk included.
    pub async fn count(&self, feed_name: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feed_items WHERE feed_name = ?")
            .bind(feed_name)
            .fetch_one(self.pool)
            .await
            .map_err(|e| FeedhubError::Database(e.to_string()))?;

        Ok(count.0)
    }

    /// Names of all feeds with at least one stored item.
    pub async fn feed_names(&self) -> Result<Vec<String>> {
        let names: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT feed_name FROM feed_items ORDER BY feed_name")
                .fetch_all(self.pool)
                .await
                .map_err(|e| FeedhubError::Database(e.to_string()))?;

        Ok(names.into_iter().map(|(n,)| n).collect())
    }
}
