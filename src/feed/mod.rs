//! Feed items, source fetching and junk filtering.

pub mod fetcher;
pub mod filter;
pub mod types;

pub use fetcher::{parse_feed, FeedFetcher, HttpFetcher};
pub use filter::Filter;
pub use types::{format_duration, Enclosure, FeedMeta, Item, ParsedFeed};
