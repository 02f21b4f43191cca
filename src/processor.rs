//! Background processing loop.
//!
//! Every cycle flattens the configured feeds into (feed, source) units and
//! runs them with bounded concurrency. A unit fetches its source, marks
//! junk, saves new items, notifies about the new non-junk ones and trims
//! the feed's history. Errors stay inside the unit that hit them.

use std::sync::Arc;

use chrono::{Months, Utc};
use futures::stream::{self, StreamExt};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::feed::{FeedFetcher, Filter, ParsedFeed};
use crate::notify::Notifier;
use crate::retry::Retry;
use crate::store::ItemRepository;

/// One (feed, source) pair.
#[derive(Debug, Clone)]
struct Unit {
    feed_name: String,
    url: String,
    filter: Filter,
    channel: String,
}

/// Counters for one unit or a whole cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Units that ran to the end.
    pub processed: usize,
    /// Units that failed to fetch or were cancelled.
    pub failed: usize,
    /// Newly stored items.
    pub created: usize,
    /// Successful notifications.
    pub notified: usize,
}

impl CycleReport {
    fn merge(mut self, other: CycleReport) -> Self {
        self.processed += other.processed;
        self.failed += other.failed;
        self.created += other.created;
        self.notified += other.notified;
        self
    }

    fn failed() -> Self {
        Self {
            failed: 1,
            ..Self::default()
        }
    }
}

/// Feed processor.
pub struct Processor {
    config: Arc<Config>,
    db: Database,
    fetcher: Arc<dyn FeedFetcher>,
    notifier: Arc<dyn Notifier>,
    retry: Retry,
}

impl Processor {
    pub fn new(
        config: Arc<Config>,
        db: Database,
        fetcher: Arc<dyn FeedFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            db,
            fetcher,
            notifier,
            retry: Retry::default(),
        }
    }

    /// Replace the notification retry policy.
    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    /// Run cycles until `cancel` fires.
    ///
    /// A cycle that already started is allowed to finish its running
    /// units; no new cycle starts after cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = Duration::from_secs(self.config.system.update_interval_secs);
        info!(
            feeds = self.config.feeds.len(),
            concurrent = self.config.system.concurrent,
            "processor started (update interval: {} seconds)",
            interval.as_secs()
        );

        while !cancel.is_cancelled() {
            let report = self.run_cycle(&cancel).await;
            info!(
                processed = report.processed,
                failed = report.failed,
                created = report.created,
                notified = report.notified,
                "refresh completed"
            );

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("processor stopped");
    }

    /// Process every unit once.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let units = self.units();
        debug!(units = units.len(), "refresh started");

        stream::iter(units)
            .map(|unit| self.process_unit(unit, cancel))
            .buffer_unordered(self.config.system.concurrent.max(1))
            .fold(CycleReport::default(), |acc, r| async move { acc.merge(r) })
            .await
    }

    fn units(&self) -> Vec<Unit> {
        self.config
            .feeds
            .iter()
            .flat_map(|(name, feed)| {
                feed.sources.iter().map(move |src| Unit {
                    feed_name: name.clone(),
                    url: src.url.clone(),
                    filter: feed.filter.clone(),
                    channel: feed.telegram_channel.clone(),
                })
            })
            .collect()
    }

    async fn process_unit(&self, unit: Unit, cancel: &CancellationToken) -> CycleReport {
        if cancel.is_cancelled() {
            return CycleReport::failed();
        }

        let fetched = tokio::select! {
            r = self.fetcher.fetch(&unit.url) => r,
            _ = cancel.cancelled() => return CycleReport::failed(),
        };
        let ParsedFeed { meta, items } = match fetched {
            Ok(feed) => feed,
            Err(e) => {
                warn!(feed = %unit.feed_name, "failed to parse {}, {}", unit.url, e);
                return CycleReport::failed();
            }
        };

        if let Err(e) = unit.filter.check() {
            warn!(feed = %unit.feed_name, "titles treated as non-matching, {}", e);
        }

        let now = Utc::now();
        let cutoff = now.checked_sub_months(Months::new(12)).unwrap_or(now);
        let repo = ItemRepository::new(self.db.pool());
        let mut report = CycleReport::default();

        for mut item in items.into_iter().take(self.config.system.max_per_feed) {
            if cancel.is_cancelled() {
                return report.merge(CycleReport::failed());
            }
            if item.published_at < cutoff {
                continue;
            }

            if unit.filter.skip(&item) {
                item.junk = true;
                info!(feed = %unit.feed_name, guid = %item.guid, "filtered {}", item.title);
            }

            let created = match repo.save(&unit.feed_name, &item).await {
                Ok(created) => created,
                Err(e) => {
                    warn!(feed = %unit.feed_name, guid = %item.guid, "failed to save, {}", e);
                    continue;
                }
            };
            if !created {
                continue;
            }
            report.created += 1;
            if item.junk {
                continue;
            }

            let sent = self
                .retry
                .run(cancel, || self.notifier.send(&unit.channel, &meta, &item))
                .await;
            match sent {
                Ok(()) => report.notified += 1,
                Err(e) => warn!(
                    feed = %unit.feed_name,
                    channel = %unit.channel,
                    "failed to send notification, {}",
                    e
                ),
            }
        }

        match repo
            .remove_old(&unit.feed_name, self.config.system.max_keep)
            .await
        {
            Ok(removed) if removed > 0 => {
                debug!(feed = %unit.feed_name, "removed {} old item(s)", removed)
            }
            Ok(_) => {}
            Err(e) => warn!(feed = %unit.feed_name, "failed to remove old items, {}", e),
        }

        report.processed += 1;
        report
    }
}
