//! Expiring load-or-compute cache for rendered payloads.
//!
//! Entries live for a fixed TTL and the total payload size is bounded;
//! when an insert would exceed the bound the oldest inserted entries are
//! evicted first. Concurrent misses on one key share a single computation.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheConfig;
use crate::{FeedhubError, Result};

/// Outcome of a cache lookup. Errors are shared between all waiters.
pub type CacheResult = std::result::Result<Bytes, Arc<FeedhubError>>;

type Computation = Shared<BoxFuture<'static, CacheResult>>;

struct Entry {
    data: Bytes,
    expires_at: Instant,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    /// Keys of resident entries, oldest insert first.
    order: VecDeque<String>,
    size: usize,
    in_flight: HashMap<String, (u64, Computation)>,
    next_id: u64,
}

impl State {
    fn remove(&mut self, key: &str) {
        if let Some(old) = self.entries.remove(key) {
            self.size -= old.data.len();
            self.order.retain(|k| k != key);
        }
    }

    fn insert(&mut self, key: String, data: Bytes, ttl: Duration, max_size: usize) {
        self.remove(&key);
        if data.len() > max_size {
            debug!(key = %key, size = data.len(), "payload larger than cache, not stored");
            return;
        }

        while self.size + data.len() > max_size {
            let Some(oldest) = self.order.front().cloned() else {
                break;
            };
            debug!(key = %oldest, "evicting cache entry");
            self.remove(&oldest);
        }

        self.size += data.len();
        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            Entry {
                data,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

/// Cache keyed by string holding byte payloads.
pub struct LoadingCache {
    ttl: Duration,
    max_size: usize,
    state: Arc<Mutex<State>>,
}

impl LoadingCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            ttl,
            max_size,
            state: Arc::default(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.max_size_bytes)
    }

    /// Return the live entry for `key`, or run `compute` to produce it.
    ///
    /// `compute` runs at most once for concurrent callers missing the same
    /// key; all of them receive its result. Failures are not cached.
    pub async fn get<F, Fut>(&self, key: &str, compute: F) -> CacheResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>> + Send + 'static,
    {
        let computation = {
            let mut state = lock(&self.state);

            let now = Instant::now();
            if let Some(entry) = state.entries.get(key).filter(|e| e.expires_at > now) {
                return Ok(entry.data.clone());
            }
            state.remove(key);

            if let Some((_, pending)) = state.in_flight.get(key) {
                pending.clone()
            } else {
                let id = state.next_id;
                state.next_id += 1;
                let pending = self.computation(key.to_string(), id, compute());
                state.in_flight.insert(key.to_string(), (id, pending.clone()));
                pending
            }
        };

        computation.await
    }

    /// Wrap a compute future so that whichever waiter drives it to
    /// completion also publishes the result. A panic in `fut` becomes an
    /// error for every waiter and clears the in-flight slot.
    fn computation<Fut>(&self, key: String, id: u64, fut: Fut) -> Computation
    where
        Fut: Future<Output = Result<Vec<u8>>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let ttl = self.ttl;
        let max_size = self.max_size;

        async move {
            let result = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(FeedhubError::Internal(format!("computing {key} panicked"))),
            };
            let result = result.map(Bytes::from).map_err(Arc::new);

            {
                let mut state = lock(&state);
                if state.in_flight.get(&key).is_some_and(|(i, _)| *i == id) {
                    state.in_flight.remove(&key);
                }
                if let Ok(data) = &result {
                    state.insert(key, data.clone(), ttl, max_size);
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Number of resident entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of resident payloads in bytes.
    pub fn size(&self) -> usize {
        lock(&self.state).size
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
