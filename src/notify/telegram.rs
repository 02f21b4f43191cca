//! Telegram Bot API delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use super::Notifier;
use crate::config::TelegramConfig;
use crate::feed::{FeedMeta, Item};
use crate::template::escape_html;
use crate::{FeedhubError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends items as HTML messages through `sendMessage`.
pub struct TelegramNotifier {
    client: Option<Client>,
    api_url: String,
    token: String,
}

impl TelegramNotifier {
    /// Create a notifier. An empty token yields a notifier that sends nothing.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let timeout = match config.timeout_secs {
            0 => DEFAULT_TIMEOUT,
            secs => Duration::from_secs(secs),
        };
        info!(
            "create telegram client for {}, timeout: {}s",
            config.api_url,
            timeout.as_secs()
        );

        let client = if config.token.is_empty() {
            None
        } else {
            Some(
                Client::builder()
                    .timeout(timeout)
                    .build()
                    .map_err(|e| {
                        FeedhubError::Notify(format!("failed to create HTTP client: {e}"))
                    })?,
            )
        };

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Whether a bot token was configured.
    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, channel_id: &str, feed: &FeedMeta, item: &Item) -> Result<()> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        if channel_id.is_empty() {
            return Ok(());
        }

        let text = message_html(feed, item);
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.token);

        let resp = client
            .post(&url)
            .json(&json!({
                "chat_id": recipient(channel_id),
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            .map_err(|e| FeedhubError::Notify(format!("can't send {}: {e}", item.guid)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedhubError::Notify(format!(
                "telegram answered {status} for {}: {body}",
                item.guid
            )));
        }

        debug!(channel = channel_id, "telegram message sent:\n{}", text);
        Ok(())
    }
}

/// Message body: bold feed title, then the item title linked to the item.
pub fn message_html(feed: &FeedMeta, item: &Item) -> String {
    let title = item.title.trim();
    let header = match (title.is_empty(), item.link.is_empty()) {
        (true, _) => String::new(),
        (false, true) => format!("{}\n\n", escape_html(title)),
        (false, false) => format!(
            "<a href=\"{}\">{}</a>\n\n",
            escape_html(&item.link),
            escape_html(title)
        ),
    };

    format!("<b>{}</b>\n\n{header}", escape_html(feed.title.trim()))
}

/// Channel names get an `@` prefix unless they are numeric chat ids.
fn recipient(channel_id: &str) -> String {
    if channel_id.parse::<i64>().is_ok() || channel_id.starts_with('@') {
        channel_id.to_string()
    } else {
        format!("@{channel_id}")
    }
}
