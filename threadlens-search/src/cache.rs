//! In-memory TTL + LRU cache for search outputs.
//!
//! Caches the final ranked results keyed by the normalised
//! (query, mode, limit) signature. Entries are bounded both by count and
//! by cumulative estimated size; the least recently used entries go first
//! when either bound would be exceeded. Expired entries are dropped on
//! access and by an optional background [`CacheJanitor`].
//!
//! Every operation takes the same mutex. Call volume is bounded by the
//! upstream rate limit, so a single lock is plenty.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::CacheConfig;
use crate::types::{SearchMode, SearchResult};

/// Composite cache key: normalised query + mode + limit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lowercased query with whitespace runs collapsed.
    query: String,
    mode: SearchMode,
    limit: usize,
}

impl CacheKey {
    /// Build a deterministic cache key.
    ///
    /// `"  Rust   ASYNC "` and `"rust async"` produce the same key.
    pub fn new(query: &str, mode: SearchMode, limit: usize) -> Self {
        let query = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        Self { query, mode, limit }
    }

    /// The normalised query string.
    pub fn query(&self) -> &str {
        &self.query
    }
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Its TTL elapsed.
    Expired,
    /// Removed to respect the item-count bound.
    Capacity,
    /// Removed to respect the cumulative size bound.
    Size,
    /// Overwritten by a newer value for the same key.
    Replaced,
    /// Removed by [`ResultCache::delete`].
    Deleted,
    /// Removed by [`ResultCache::clear`].
    Cleared,
}

/// Callback invoked for every entry that leaves the cache.
///
/// Runs after the cache lock is released, so it may call back into the cache.
pub type EvictionListener = Box<dyn Fn(&CacheKey, &[SearchResult], EvictionReason) + Send + Sync>;

/// Hit/miss/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a live value.
    pub hits: u64,
    /// Lookups that found nothing or an expired entry.
    pub misses: u64,
    /// Entries removed for any reason other than explicit delete/clear/replace.
    pub evictions: u64,
}

#[derive(Debug)]
struct CacheEntry {
    value: Vec<SearchResult>,
    expires_at: Instant,
    size: usize,
    /// Position in the recency index; larger is more recent.
    tick: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Recency index: tick → key. The first entry is the least recently used.
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    total_bytes: usize,
    stats: CacheStats,
}

type Evicted = Vec<(CacheKey, Vec<SearchResult>, EvictionReason)>;

impl Inner {
    fn bump_tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn touch(&mut self, key: &CacheKey) {
        let tick = self.bump_tick();
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.tick);
            entry.tick = tick;
            self.recency.insert(tick, key.clone());
        }
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    fn pop_lru(&mut self) -> Option<(CacheKey, CacheEntry)> {
        let (_, key) = self.recency.pop_first()?;
        let entry = self.entries.remove(&key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some((key, entry))
    }
}

/// Capacity- and size-bounded TTL cache of ranked search outputs.
pub struct ResultCache {
    inner: Mutex<Inner>,
    default_ttl: Duration,
    max_entries: usize,
    max_bytes: usize,
    on_evict: Option<EvictionListener>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("default_ttl", &self.default_ttl)
            .field("max_entries", &self.max_entries)
            .field("max_bytes", &self.max_bytes)
            .field("len", &self.len())
            .finish()
    }
}

impl ResultCache {
    /// Create a cache with explicit bounds.
    pub fn new(default_ttl: Duration, max_entries: usize, max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            default_ttl,
            max_entries: max_entries.max(1),
            max_bytes: max_bytes.max(1),
            on_evict: None,
        }
    }

    /// Create a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            Duration::from_secs(config.ttl_seconds),
            config.max_entries,
            config.max_bytes,
        )
    }

    /// Attach a callback invoked whenever an entry leaves the cache.
    pub fn with_eviction_listener(
        mut self,
        listener: impl Fn(&CacheKey, &[SearchResult], EvictionReason) + Send + Sync + 'static,
    ) -> Self {
        self.on_evict = Some(Box::new(listener));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, evicted: Evicted) {
        if let Some(listener) = &self.on_evict {
            for (key, value, reason) in &evicted {
                listener(key, value, *reason);
            }
        }
    }

    /// Look up a cached value.
    ///
    /// Returns `None` on a miss. An entry found past its expiry is evicted
    /// and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<SearchResult>> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        let found = {
            let mut inner = self.lock();
            match inner.entries.get(key).map(|e| e.expires_at <= now) {
                None => {
                    inner.stats.misses += 1;
                    None
                }
                Some(true) => {
                    inner.stats.misses += 1;
                    inner.stats.evictions += 1;
                    if let Some(entry) = inner.remove(key) {
                        evicted.push((key.clone(), entry.value, EvictionReason::Expired));
                    }
                    None
                }
                Some(false) => {
                    inner.stats.hits += 1;
                    inner.touch(key);
                    inner.entries.get(key).map(|e| e.value.clone())
                }
            }
        };
        self.notify(evicted);
        found
    }

    /// Insert or replace a value with the default TTL.
    ///
    /// Returns `false` if the value alone exceeds the size bound and was
    /// not stored.
    pub fn set(&self, key: CacheKey, value: Vec<SearchResult>) -> bool {
        self.set_with_ttl(key, value, self.default_ttl)
    }

    /// Insert or replace a value with an explicit TTL.
    ///
    /// Least recently used entries are evicted until both the count and the
    /// size bound leave room for the new entry.
    pub fn set_with_ttl(&self, key: CacheKey, value: Vec<SearchResult>, ttl: Duration) -> bool {
        let size = estimate_size(&value);
        if size > self.max_bytes {
            tracing::debug!(size, max_bytes = self.max_bytes, "value larger than cache, not stored");
            return false;
        }

        let mut evicted = Vec::new();
        {
            let mut inner = self.lock();
            if let Some(old) = inner.remove(&key) {
                evicted.push((key.clone(), old.value, EvictionReason::Replaced));
            }

            loop {
                let reason = if inner.entries.len() + 1 > self.max_entries {
                    EvictionReason::Capacity
                } else if inner.total_bytes + size > self.max_bytes {
                    EvictionReason::Size
                } else {
                    break;
                };
                let Some((lru_key, entry)) = inner.pop_lru() else {
                    break;
                };
                inner.stats.evictions += 1;
                evicted.push((lru_key, entry.value, reason));
            }

            let tick = inner.bump_tick();
            inner.total_bytes += size;
            inner.recency.insert(tick, key.clone());
            inner.entries.insert(
                key,
                CacheEntry {
                    value,
                    expires_at: Instant::now() + ttl,
                    size,
                    tick,
                },
            );
        }
        self.notify(evicted);
        true
    }

    /// Remove one entry. Returns whether it was present.
    pub fn delete(&self, key: &CacheKey) -> bool {
        let removed = self.lock().remove(key);
        match removed {
            Some(entry) => {
                self.notify(vec![(key.clone(), entry.value, EvictionReason::Deleted)]);
                true
            }
            None => false,
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let evicted: Evicted = {
            let mut inner = self.lock();
            inner.recency.clear();
            inner.total_bytes = 0;
            inner
                .entries
                .drain()
                .map(|(key, entry)| (key, entry.value, EvictionReason::Cleared))
                .collect()
        };
        self.notify(evicted);
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let evicted: Evicted = {
            let mut inner = self.lock();
            let expired: Vec<CacheKey> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.expires_at <= now)
                .map(|(key, _)| key.clone())
                .collect();
            let mut evicted = Vec::with_capacity(expired.len());
            for key in expired {
                if let Some(entry) = inner.remove(&key) {
                    inner.stats.evictions += 1;
                    evicted.push((key, entry.value, EvictionReason::Expired));
                }
            }
            evicted
        };
        let count = evicted.len();
        self.notify(evicted);
        count
    }

    /// Number of entries currently stored (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cumulative estimated size of stored values, in bytes.
    pub fn total_bytes(&self) -> usize {
        self.lock().total_bytes
    }

    /// Snapshot of the hit/miss/eviction counters.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Spawn a background task that purges expired entries every `every`.
    ///
    /// The task holds only a weak reference, so it ends on its own once the
    /// cache is dropped. [`CacheJanitor::stop`] ends it explicitly.
    pub fn start_janitor(self: &Arc<Self>, every: Duration) -> CacheJanitor {
        let cache = Arc::downgrade(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else { break };
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "swept expired cache entries");
                        }
                    }
                }
            }
            tracing::trace!("cache janitor stopped");
        });

        CacheJanitor {
            cancel,
            handle: Some(handle),
        }
    }
}

/// Handle to the background expiry sweep.
///
/// Dropping the handle cancels the sweep; [`CacheJanitor::stop`] also
/// waits for the task to finish.
#[derive(Debug)]
pub struct CacheJanitor {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CacheJanitor {
    /// Cancel the sweep and wait for the task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Whether the sweep task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for CacheJanitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn estimate_size(value: &[SearchResult]) -> usize {
    value.iter().map(SearchResult::estimated_size).sum::<usize>() + 24
}
