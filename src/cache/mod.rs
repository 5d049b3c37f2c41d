//! Query cache: process-wide keyed cache of the most recent fetch per key.
//!
//! Key properties:
//! - Observers of one key share one entry, one in-flight fetch and one result
//! - `enabled = false` keeps a query from fetching until the gate is lifted
//! - `invalidate` marks entries stale and refetches those being watched
//! - An entry lives as long as it has observers; late results for a dropped
//!   entry are discarded
//!
//! Fetches run as spawned Tokio tasks, so observing requires a runtime.

pub mod keys;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use crate::gateway::GatewayError;

pub use keys::QueryKey;

/// Future produced by a fetcher.
pub type QueryFuture = BoxFuture<'static, Result<Value, GatewayError>>;

/// Fetcher bound to one query key. Called once per network fetch.
pub type QueryFn = Arc<dyn Fn() -> QueryFuture + Send + Sync>;

// ═══════════════════════════════════════════════════════════
// Observable state
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched (gate closed).
    Idle,
    /// First fetch in progress, no data yet.
    Loading,
    Success,
    /// Last fetch failed. Earlier data, if any, is kept.
    Error,
}

/// Snapshot of one cache entry as seen by its observers.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub status: QueryStatus,
    pub data: Option<Arc<Value>>,
    pub error: Option<GatewayError>,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl QueryState {
    fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: false,
            updated_at: None,
        }
    }

    /// True while the first fetch is running.
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// Deserialize the cached data, if any.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.data
            .as_deref()
            .map(|v| T::deserialize(v))
            .transpose()
    }

    fn needs_fetch(&self) -> bool {
        self.data.is_none() || self.is_stale || self.status == QueryStatus::Error
    }
}

/// Observer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Whether the fetcher may run at all.
    pub enabled: bool,
    /// Fetch on subscription even when fresh data is cached.
    pub refetch_on_mount: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            refetch_on_mount: false,
        }
    }
}

impl QueryOptions {
    pub fn gated(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }
}

/// Per-key counters, kept while some live entry falls under the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Network fetches started for this exact key.
    pub fetches: u64,
    /// `invalidate` calls made with this exact key that matched an entry.
    pub invalidations: u64,
}

// ═══════════════════════════════════════════════════════════
// Internals
// ═══════════════════════════════════════════════════════════

struct Entry {
    /// Distinguishes this entry from a later one under the same key.
    epoch: u64,
    state: watch::Sender<QueryState>,
    query_fn: QueryFn,
    /// observer id → enabled
    observers: HashMap<u64, bool>,
    in_flight: bool,
    refetch_queued: bool,
}

impl Entry {
    fn has_enabled_observer(&self) -> bool {
        self.observers.values().any(|enabled| *enabled)
    }

    fn needs_fetch(&self) -> bool {
        self.state.borrow().needs_fetch()
    }
}

#[derive(Default)]
struct CacheInner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    stats: Mutex<HashMap<QueryKey, QueryStats>>,
    next_id: AtomicU64,
}

impl CacheInner {
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, key: &QueryKey, update: impl FnOnce(&mut QueryStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        update(stats.entry(key.clone()).or_default());
    }

    /// Forget counters no live entry falls under.
    fn prune_stats(&self, entries: &HashMap<QueryKey, Entry>) {
        let mut stats = self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        stats.retain(|key, _| entries.keys().any(|live| live.starts_with(key)));
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Apply a finished fetch. Called from the spawned fetch task.
    fn complete(self: &Arc<Self>, key: &QueryKey, epoch: u64, result: Result<Value, GatewayError>) {
        let mut entries = self.lock_entries();
        let Some(entry) = entries.get_mut(key).filter(|e| e.epoch == epoch) else {
            tracing::debug!(key = %key, "Query result discarded, no observers left");
            return;
        };

        entry.in_flight = false;
        let refetch = std::mem::take(&mut entry.refetch_queued);
        entry.state.send_modify(|state| {
            state.is_fetching = false;
            match result {
                Ok(value) => {
                    state.status = QueryStatus::Success;
                    state.data = Some(Arc::new(value));
                    state.error = None;
                    state.is_stale = refetch;
                    state.updated_at = Some(Utc::now());
                }
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Query fetch failed");
                    state.status = QueryStatus::Error;
                    state.error = Some(error);
                }
            }
        });

        if refetch && entry.has_enabled_observer() {
            start_fetch(self, key, entry);
        }
    }
}

/// Kick off a fetch for `entry`. Caller holds the entries lock.
fn start_fetch(inner: &Arc<CacheInner>, key: &QueryKey, entry: &mut Entry) {
    entry.in_flight = true;
    entry.state.send_modify(|state| {
        state.is_fetching = true;
        if state.data.is_none() {
            state.status = QueryStatus::Loading;
        }
    });
    inner.record(key, |stats| stats.fetches += 1);
    tracing::debug!(key = %key, "Query fetch started");

    let future = (entry.query_fn)();
    let epoch = entry.epoch;
    let inner = Arc::clone(inner);
    let key = key.clone();
    tokio::spawn(async move {
        let result = future.await;
        inner.complete(&key, epoch, result);
    });
}

// ═══════════════════════════════════════════════════════════
// QueryCache
// ═══════════════════════════════════════════════════════════

/// Shared query cache. Cheap to clone; clones share entries.
#[derive(Clone, Default)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `key`.
    ///
    /// The first observer's `query_fn` serves the entry for its lifetime. An
    /// enabled observer triggers a fetch unless one is already in flight or
    /// fresh data exists (and `refetch_on_mount` is off).
    pub fn observe(&self, key: QueryKey, query_fn: QueryFn, options: QueryOptions) -> QueryObserver {
        let id = self.inner.next_id();
        let mut entries = self.inner.lock_entries();
        let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
            epoch: self.inner.next_id(),
            state: watch::Sender::new(QueryState::idle()),
            query_fn,
            observers: HashMap::new(),
            in_flight: false,
            refetch_queued: false,
        });
        entry.observers.insert(id, options.enabled);
        let rx = entry.state.subscribe();

        if options.enabled && !entry.in_flight && (options.refetch_on_mount || entry.needs_fetch()) {
            start_fetch(&self.inner, &key, entry);
        }
        drop(entries);

        QueryObserver {
            id,
            key,
            rx,
            cache: Arc::clone(&self.inner),
        }
    }

    /// Mark every entry under `prefix` stale and refetch the watched ones.
    /// Returns how many entries matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut matched = 0;
        {
            let mut entries = self.inner.lock_entries();
            for (key, entry) in entries.iter_mut().filter(|(k, _)| k.starts_with(prefix)) {
                matched += 1;
                entry.state.send_modify(|state| state.is_stale = true);
                if !entry.has_enabled_observer() {
                    continue;
                }
                if entry.in_flight {
                    entry.refetch_queued = true;
                } else {
                    start_fetch(&self.inner, key, entry);
                }
            }
        }
        if matched > 0 {
            self.inner.record(prefix, |stats| stats.invalidations += 1);
        }
        tracing::debug!(key = %prefix, matched, "Query invalidated");
        matched
    }

    /// Current state for `key` without subscribing.
    pub fn peek(&self, key: &QueryKey) -> Option<QueryState> {
        self.inner
            .lock_entries()
            .get(key)
            .map(|entry| entry.state.borrow().clone())
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.lock_entries().contains_key(key)
    }

    /// Number of live observers on `key`.
    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.inner
            .lock_entries()
            .get(key)
            .map_or(0, |entry| entry.observers.len())
    }

    pub fn stats(&self, key: &QueryKey) -> QueryStats {
        self.inner
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .copied()
            .unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════
// QueryObserver
// ═══════════════════════════════════════════════════════════

/// One subscriber of a cache key. Dropping it unsubscribes; the entry goes
/// away with its last observer.
pub struct QueryObserver {
    id: u64,
    key: QueryKey,
    rx: watch::Receiver<QueryState>,
    cache: Arc<CacheInner>,
}

impl QueryObserver {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> QueryState {
        self.rx.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.rx.borrow().is_loading()
    }

    /// Cached data decoded as `T`.
    pub fn data<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.rx.borrow().decode()
    }

    /// Open or close this observer's fetch gate.
    pub fn set_enabled(&self, enabled: bool) {
        let mut entries = self.cache.lock_entries();
        let Some(entry) = entries.get_mut(&self.key) else {
            return;
        };
        let was_enabled = entry.observers.insert(self.id, enabled).unwrap_or(false);
        if enabled && !was_enabled && !entry.in_flight && entry.needs_fetch() {
            start_fetch(&self.cache, &self.key, entry);
        }
    }

    /// Force a fetch (shared with any fetch already in flight).
    pub fn refetch(&self) {
        let mut entries = self.cache.lock_entries();
        if let Some(entry) = entries.get_mut(&self.key) {
            if !entry.in_flight {
                start_fetch(&self.cache, &self.key, entry);
            }
        }
    }

    /// Wait for the next state change. Returns false if the entry is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until no fetch is running and return the resulting state.
    /// Returns immediately for a gated observer that never fetched.
    pub async fn settled(&mut self) -> QueryState {
        loop {
            {
                let state = self.rx.borrow_and_update();
                if !state.is_fetching {
                    return state.clone();
                }
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        let mut entries = self.cache.lock_entries();
        let remove = match entries.get_mut(&self.key) {
            Some(entry) => {
                entry.observers.remove(&self.id);
                entry.observers.is_empty()
            }
            None => false,
        };
        if remove {
            entries.remove(&self.key);
            self.cache.prune_stats(&entries);
            tracing::debug!(key = %self.key, "Query entry dropped");
        }
    }
}
