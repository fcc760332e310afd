//! In-memory response store with per-entry TTL and LRU eviction.
//!
//! All mutation (read promotion, insert, sweep, invalidate) happens under a
//! single mutex so the recency order and the size bound stay consistent when
//! the store is shared between tasks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use regex::Regex;

use super::clock::{Clock, SystemClock};

/// Selects keys for [`CacheStore::invalidate`].
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Keys containing the string.
    Contains(String),
    /// Keys matching the regular expression.
    Regex(Regex),
}

impl Pattern {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Pattern::Contains(needle) => key.contains(needle.as_str()),
            Pattern::Regex(re) => re.is_match(key),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::Contains(s.to_string())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Pattern::Contains(s)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

struct Entry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    /// Position in the recency order; larger is more recent.
    tick: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self { entries: HashMap::new(), recency: BTreeMap::new(), next_tick: 0 }
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        Some(entry)
    }

    fn promote(&mut self, key: &str) {
        let tick = self.bump();
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.tick);
            entry.tick = tick;
            self.recency.insert(tick, key.to_string());
        }
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// Bounded TTL + LRU store keyed by request fingerprint.
///
/// "Use" for recency covers both writes and successful reads. The store never
/// fails; anything unexpected degrades to a miss.
pub struct CacheStore<V> {
    inner: Mutex<Inner<V>>,
    max_size: usize,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> CacheStore<V> {
    /// Create a store holding at most `max_size` entries (minimum 1).
    pub fn new(max_size: usize) -> Self {
        Self::with_clock(max_size, Arc::new(SystemClock))
    }

    pub fn with_clock(max_size: usize, clock: Arc<dyn Clock>) -> Self {
        Self { inner: Mutex::new(Inner::new()), max_size: max_size.max(1), clock }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Look up a live entry and mark it most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = inner.entries.get(key)?.is_expired(now);
        if expired {
            inner.remove(key);
            tracing::debug!("cache entry expired: {}", key);
            return None;
        }

        inner.promote(key);
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value` under `key` for `ttl`.
    ///
    /// Expired entries are swept first. When the store is full and `key` is
    /// new, the least recently used entry is evicted.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        inner.purge_expired(now);

        let existed = inner.remove(&key).is_some();
        if !existed
            && inner.entries.len() >= self.max_size
            && let Some(evicted) = inner.evict_lru()
        {
            tracing::debug!("cache full ({}), evicted {}", self.max_size, evicted);
        }

        let tick = inner.bump();
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(key, Entry { value, created_at: now, ttl, tick });
    }

    /// Whether a live entry exists. Does not affect recency.
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        match inner.entries.get(key).map(|entry| entry.is_expired(now)) {
            Some(false) => true,
            Some(true) => {
                inner.remove(key);
                false
            }
            None => false,
        }
    }

    /// Remove every key matching `pattern`. Returns the number removed.
    pub fn invalidate(&self, pattern: impl Into<Pattern>) -> usize {
        let pattern = pattern.into();
        let mut inner = self.inner.lock();

        let matched: Vec<String> = inner.entries.keys().filter(|key| pattern.matches(key)).cloned().collect();
        for key in &matched {
            inner.remove(key);
        }

        if !matched.is_empty() {
            tracing::debug!(removed = matched.len(), "cache invalidated");
        }
        matched.len()
    }

    /// Number of live entries.
    pub fn size(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.purge_expired(now);
        inner.entries.len()
    }

    /// Live keys, least recently used first.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.purge_expired(now);
        inner.recency.values().cloned().collect()
    }

    /// Drop expired entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.inner.lock().purge_expired(now)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
    }
}

impl<V> std::fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("max_size", &self.max_size)
            .field("len", &self.inner.lock().entries.len())
            .finish()
    }
}
