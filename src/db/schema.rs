//! Database schema and migrations.
//!
//! Migrations are applied in order when the database is opened. The
//! schema_version table records which of them have run.

pub const MIGRATIONS: &[&str] = &[
    // v1: feed item history
    r#"
CREATE TABLE feed_items (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_name         TEXT NOT NULL,
    guid              TEXT NOT NULL,
    title             TEXT NOT NULL,
    link              TEXT NOT NULL DEFAULT '',
    description       TEXT NOT NULL DEFAULT '',
    content           TEXT,
    pub_date          TEXT NOT NULL DEFAULT '',   -- original RFC 2822 string
    published_at      INTEGER NOT NULL,           -- unix seconds
    author            TEXT,
    duration          TEXT,                       -- seconds, as published
    enclosure_url     TEXT,
    enclosure_length  INTEGER,
    enclosure_type    TEXT,
    junk              INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (feed_name, guid)
);

CREATE INDEX idx_feed_items_recent ON feed_items(feed_name, published_at DESC, id DESC);
"#,
];
