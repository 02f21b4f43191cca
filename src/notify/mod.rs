//! Delivery of new items to notification channels.

pub mod telegram;

use async_trait::async_trait;

use crate::feed::{FeedMeta, Item};
use crate::Result;

pub use telegram::TelegramNotifier;

/// Capability to deliver one item to one destination channel.
///
/// An empty `channel_id` or an unconfigured client is a successful no-op.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel_id: &str, feed: &FeedMeta, item: &Item) -> Result<()>;
}
