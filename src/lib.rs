//! feedhub - RSS/Atom aggregator.
//!
//! Polls configured sources, keeps a deduplicated per-feed history in
//! SQLite, relays new items to Telegram and republishes every feed as a
//! podcast RSS document and an HTML page.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;
pub mod notify;
pub mod processor;
pub mod render;
pub mod retry;
pub mod store;
pub mod template;
pub mod web;

pub use config::Config;
pub use db::Database;
pub use error::{FeedhubError, Result};
