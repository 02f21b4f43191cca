//! Processor integration tests.
//!
//! The fetch and delivery collaborators are replaced by in-process fakes;
//! the store is a real in-memory database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use feedhub::config::{FeedConfig, Source};
use feedhub::feed::{FeedFetcher, FeedMeta, Filter, Item, ParsedFeed};
use feedhub::notify::Notifier;
use feedhub::processor::Processor;
use feedhub::retry::Retry;
use feedhub::store::ItemRepository;
use feedhub::{Config, Database, FeedhubError, Result};

/// Fetcher serving canned feeds and tracking how many fetches overlap.
#[derive(Default)]
struct FakeFetcher {
    sources: Mutex<HashMap<String, ParsedFeed>>,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeFetcher {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn serve(&self, url: &str, items: Vec<Item>) {
        let feed = ParsedFeed {
            meta: FeedMeta {
                title: format!("Source {url}"),
                ..FeedMeta::default()
            },
            items,
        };
        self.sources.lock().unwrap().insert(url.to_string(), feed);
    }
}

#[async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.sources
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FeedhubError::Fetch(format!("no such source {url}")))
    }
}

/// Notifier recording every attempt; the first `failures` attempts fail.
#[derive(Default)]
struct RecordingNotifier {
    attempts: Mutex<Vec<(String, String)>>,
    failures: AtomicUsize,
}

impl RecordingNotifier {
    fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    fn guids(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, guid)| guid.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, channel_id: &str, _feed: &FeedMeta, item: &Item) -> Result<()> {
        self.attempts
            .lock()
            .unwrap()
            .push((channel_id.to_string(), item.guid.clone()));

        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(FeedhubError::Notify("bot unavailable".to_string()));
        }
        Ok(())
    }
}

fn item(guid: &str, hours_ago: i64) -> Item {
    Item::new(
        guid,
        format!("Title {guid}"),
        format!("https://example.com/{guid}"),
        Utc::now() - chrono::Duration::hours(hours_ago),
    )
}

fn feed(urls: &[&str], filter: Filter) -> FeedConfig {
    FeedConfig {
        title: "Feed".to_string(),
        telegram_channel: "chan".to_string(),
        filter,
        sources: urls
            .iter()
            .map(|url| Source {
                name: url.to_string(),
                url: url.to_string(),
            })
            .collect(),
        ..FeedConfig::default()
    }
}

fn config(feeds: Vec<(&str, FeedConfig)>) -> Config {
    let mut config = Config::default();
    for (name, feed) in feeds {
        config.feeds.insert(name.to_string(), feed);
    }
    config
}

async fn setup(
    config: Config,
    fetcher: Arc<FakeFetcher>,
    notifier: Arc<RecordingNotifier>,
) -> (Processor, Database) {
    let db = Database::open_in_memory().await.unwrap();
    let processor = Processor::new(Arc::new(config), db.clone(), fetcher, notifier)
        .with_retry(Retry::new(3, Duration::from_millis(10)));
    (processor, db)
}

#[tokio::test]
async fn test_news_end_to_end() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve(
        "https://news.example.com/rss",
        vec![item("a", 1), item("b", 2), item("c", 3)],
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let config = config(vec![(
        "news",
        feed(&["https://news.example.com/rss"], Filter::default()),
    )]);
    let (processor, db) = setup(config, fetcher, notifier.clone()).await;
    let cancel = CancellationToken::new();

    let first = processor.run_cycle(&cancel).await;
    assert_eq!(first.processed, 1);
    assert_eq!(first.created, 3);
    assert_eq!(first.notified, 3);

    let repo = ItemRepository::new(db.pool());
    let items = repo.load("news", 10, true).await.unwrap();
    let guids: Vec<_> = items.iter().map(|i| i.guid.as_str()).collect();
    assert_eq!(guids, vec!["a", "b", "c"]);

    let second = processor.run_cycle(&cancel).await;
    assert_eq!(second.created, 0);
    assert_eq!(second.notified, 0);
    assert_eq!(repo.count("news").await.unwrap(), 3);

    assert_eq!(notifier.guids(), vec!["a", "b", "c"]);
    assert!(notifier
        .attempts
        .lock()
        .unwrap()
        .iter()
        .all(|(chan, _)| chan == "chan"));
}

#[tokio::test]
async fn test_stale_items_are_skipped() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("https://old.example.com/rss", vec![item("ancient", 400 * 24)]);
    let notifier = Arc::new(RecordingNotifier::default());
    let config = config(vec![(
        "old",
        feed(&["https://old.example.com/rss"], Filter::default()),
    )]);
    let (processor, db) = setup(config, fetcher, notifier.clone()).await;

    let report = processor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.created, 0);
    assert!(notifier.guids().is_empty());

    let repo = ItemRepository::new(db.pool());
    assert!(matches!(
        repo.load("old", 10, false).await,
        Err(FeedhubError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_junk_is_stored_but_not_notified() {
    let fetcher = Arc::new(FakeFetcher::default());
    let mut ad = item("ad", 1);
    ad.title = "Ad: buy now".to_string();
    fetcher.serve("https://mixed.example.com/rss", vec![ad, item("real", 2)]);
    let notifier = Arc::new(RecordingNotifier::default());
    let config = config(vec![(
        "mixed",
        feed(&["https://mixed.example.com/rss"], Filter::new("^Ad:", false)),
    )]);
    let (processor, db) = setup(config, fetcher, notifier.clone()).await;

    let report = processor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.created, 2);
    assert_eq!(report.notified, 1);
    assert_eq!(notifier.guids(), vec!["real"]);

    let repo = ItemRepository::new(db.pool());
    assert_eq!(repo.count("mixed").await.unwrap(), 2);
    let visible = repo.load("mixed", 10, true).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].guid, "real");
    let all = repo.load("mixed", 10, false).await.unwrap();
    assert!(all.iter().any(|i| i.guid == "ad" && i.junk));
}

#[tokio::test]
async fn test_invalid_filter_is_non_match() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("https://f.example.com/rss", vec![item("x", 1)]);
    fetcher.serve("https://g.example.com/rss", vec![item("y", 1)]);
    let notifier = Arc::new(RecordingNotifier::default());
    let config = config(vec![
        (
            "f",
            feed(&["https://f.example.com/rss"], Filter::new("([broken", false)),
        ),
        (
            "g",
            feed(&["https://g.example.com/rss"], Filter::new("([broken", true)),
        ),
    ]);
    let (processor, db) = setup(config, fetcher, notifier.clone()).await;

    let report = processor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.created, 2);

    let repo = ItemRepository::new(db.pool());
    // Plain: the item is kept and announced.
    assert_eq!(repo.load("f", 10, true).await.unwrap().len(), 1);
    // Inverted: the non-match flips to junk, stored but not announced.
    assert!(repo.load("g", 10, true).await.unwrap().is_empty());
    let all = repo.load("g", 10, false).await.unwrap();
    assert!(all[0].junk);
    assert_eq!(notifier.guids(), vec!["x"]);
}

#[tokio::test]
async fn test_max_per_feed_takes_first_items() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve(
        "https://many.example.com/rss",
        (0..5).map(|i| item(&format!("g{i}"), i)).collect(),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let mut config = config(vec![(
        "many",
        feed(&["https://many.example.com/rss"], Filter::default()),
    )]);
    config.system.max_per_feed = 2;
    let (processor, db) = setup(config, fetcher, notifier).await;

    let report = processor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.created, 2);

    let repo = ItemRepository::new(db.pool());
    let guids: Vec<_> = repo
        .load("many", 10, false)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.guid)
        .collect();
    assert_eq!(guids, vec!["g0", "g1"]);
}

#[tokio::test]
async fn test_retention_trim_after_unit() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve(
        "https://keep.example.com/rss",
        (0..4).map(|i| item(&format!("g{i}"), i)).collect(),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let mut config = config(vec![(
        "keep",
        feed(&["https://keep.example.com/rss"], Filter::default()),
    )]);
    config.system.max_keep = 2;
    let (processor, db) = setup(config, fetcher, notifier.clone()).await;

    processor.run_cycle(&CancellationToken::new()).await;

    let repo = ItemRepository::new(db.pool());
    let guids: Vec<_> = repo
        .load("keep", 10, false)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.guid)
        .collect();
    assert_eq!(guids, vec!["g0", "g1"]);
    assert_eq!(notifier.guids().len(), 4);
}

#[tokio::test]
async fn test_fetch_failure_does_not_abort_cycle() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("https://ok.example.com/rss", vec![item("ok", 1)]);
    let notifier = Arc::new(RecordingNotifier::default());
    let config = config(vec![
        ("broken", feed(&["https://broken.example.com/rss"], Filter::default())),
        ("ok", feed(&["https://ok.example.com/rss"], Filter::default())),
    ]);
    let (processor, db) = setup(config, fetcher, notifier).await;

    let report = processor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.processed, 1);

    let repo = ItemRepository::new(db.pool());
    assert_eq!(repo.count("ok").await.unwrap(), 1);
}

#[tokio::test]
async fn test_sources_of_one_feed_dedup() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("https://one.example.com/rss", vec![item("shared", 1)]);
    fetcher.serve("https://two.example.com/rss", vec![item("shared", 1)]);
    let notifier = Arc::new(RecordingNotifier::default());
    let config = config(vec![(
        "merged",
        feed(
            &["https://one.example.com/rss", "https://two.example.com/rss"],
            Filter::default(),
        ),
    )]);
    let (processor, db) = setup(config, fetcher, notifier.clone()).await;

    let report = processor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.processed, 2);
    assert_eq!(report.created, 1);
    assert_eq!(notifier.guids(), vec!["shared"]);

    let repo = ItemRepository::new(db.pool());
    assert_eq!(repo.count("merged").await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrency_ceiling() {
    let fetcher = Arc::new(FakeFetcher::with_delay(Duration::from_millis(50)));
    let mut feeds = Vec::new();
    let urls: Vec<String> = (0..5).map(|i| format!("https://s{i}.example.com/rss")).collect();
    for (i, url) in urls.iter().enumerate() {
        fetcher.serve(url, vec![item(&format!("g{i}"), 1)]);
    }
    let names: Vec<String> = (0..5).map(|i| format!("feed{i}")).collect();
    for (name, url) in names.iter().zip(&urls) {
        feeds.push((name.as_str(), feed(&[url.as_str()], Filter::default())));
    }
    let notifier = Arc::new(RecordingNotifier::default());
    let mut config = config(feeds);
    config.system.concurrent = 2;
    let (processor, _db) = setup(config, fetcher.clone(), notifier).await;

    let report = processor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.processed, 5);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 5);
    assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_notification_is_retried() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("https://r.example.com/rss", vec![item("r", 1)]);
    let notifier = Arc::new(RecordingNotifier::failing(2));
    let config = config(vec![(
        "r",
        feed(&["https://r.example.com/rss"], Filter::default()),
    )]);
    let (processor, _db) = setup(config, fetcher, notifier.clone()).await;

    let report = processor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.notified, 1);
    assert_eq!(notifier.guids(), vec!["r", "r", "r"]);
}

#[tokio::test]
async fn test_failed_notification_keeps_item() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("https://r.example.com/rss", vec![item("r", 1)]);
    let notifier = Arc::new(RecordingNotifier::failing(usize::MAX));
    let config = config(vec![(
        "r",
        feed(&["https://r.example.com/rss"], Filter::default()),
    )]);
    let (processor, db) = setup(config, fetcher, notifier.clone()).await;

    let report = processor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.created, 1);
    assert_eq!(report.notified, 0);
    assert_eq!(notifier.guids().len(), 3);

    let repo = ItemRepository::new(db.pool());
    assert_eq!(repo.count("r").await.unwrap(), 1);

    // Already stored, so the next cycle does not notify again.
    processor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(notifier.guids().len(), 3);
}

#[tokio::test]
async fn test_cancelled_cycle_starts_no_units() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("https://c.example.com/rss", vec![item("c", 1)]);
    let notifier = Arc::new(RecordingNotifier::default());
    let config = config(vec![(
        "c",
        feed(&["https://c.example.com/rss"], Filter::default()),
    )]);
    let (processor, _db) = setup(config, fetcher.clone(), notifier).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = processor.run_cycle(&cancel).await;
    assert_eq!(report.processed, 0);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

async fn wait_for_calls(fetcher: &FakeFetcher, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while fetcher.calls.load(Ordering::SeqCst) < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_run_loops_until_cancelled() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("https://l.example.com/rss", vec![item("l", 1)]);
    let notifier = Arc::new(RecordingNotifier::default());
    let mut config = config(vec![(
        "l",
        feed(&["https://l.example.com/rss"], Filter::default()),
    )]);
    config.system.update_interval_secs = 1;
    let (processor, db) = setup(config, fetcher.clone(), notifier.clone()).await;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { processor.run(cancel).await }
    });

    wait_for_calls(&fetcher, 2).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();

    let calls = fetcher.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), calls);

    // The item was stored once and announced once across cycles.
    let repo = ItemRepository::new(db.pool());
    assert_eq!(repo.count("l").await.unwrap(), 1);
    assert_eq!(notifier.guids(), vec!["l"]);
}
