//! Proxy document cache.
//!
//! Maps a canonical source URL to the transformed document produced for it.
//! Entries expire after a TTL and the store is bounded by batch compaction:
//! once a `put` pushes it past `capacity`, the oldest entries are dropped
//! until `compact_target` remain.
//!
//! ## Architecture
//!
//! ```text
//! Proxy Request → ProxyCache.get() → fresh? → cached document
//!                        ↓ (miss)
//!                fetch + transform → ProxyCache.put() → compact if over capacity
//!
//! start_sweeping() → purge_expired() every sweep_interval
//! ```
//!
//! Insert and compaction run under one write lock, so concurrent puts can
//! never leave the store above capacity or partially compacted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default entry count that triggers compaction.
pub const DEFAULT_CAPACITY: usize = 100;

/// Default entry count left after compaction.
pub const DEFAULT_COMPACT_TARGET: usize = 50;

/// Default interval of the background expiry sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCacheConfig {
    pub ttl: Duration,
    pub capacity: usize,
    pub compact_target: usize,
    pub sweep_interval: Duration,
}

impl Default for ProxyCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
            compact_target: DEFAULT_COMPACT_TARGET,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ProxyCacheConfig {
    /// Sets the entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the capacity and compaction target.
    pub fn with_capacity(mut self, capacity: usize, compact_target: usize) -> Self {
        self.capacity = capacity;
        self.compact_target = compact_target;
        self
    }

    /// Sets the background sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Clamps limits so compaction always keeps at least one entry.
    fn normalized(mut self) -> Self {
        self.capacity = self.capacity.max(1);
        self.compact_target = self.compact_target.clamp(1, self.capacity);
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    document: Arc<str>,
    captured_at: Instant,
    seq: u64,
}

/// Bounded, time-expiring document cache.
#[derive(Debug)]
pub struct ProxyCache {
    config: ProxyCacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    next_seq: AtomicU64,
}

impl Default for ProxyCache {
    fn default() -> Self {
        Self::new(ProxyCacheConfig::default())
    }
}

impl ProxyCache {
    /// Creates an empty cache.
    pub fn new(config: ProxyCacheConfig) -> Self {
        Self {
            config: config.normalized(),
            entries: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Returns the effective configuration.
    pub fn config(&self) -> &ProxyCacheConfig {
        &self.config
    }

    /// Returns the document for `key` if present and fresh.
    ///
    /// Stale entries read as a miss but stay stored until a sweep or
    /// compaction removes them.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.captured_at.elapsed() < self.config.ttl {
            Some(entry.document.clone())
        } else {
            None
        }
    }

    /// Inserts or overwrites a document, compacting if over capacity.
    pub fn put(&self, key: impl Into<String>, document: impl Into<Arc<str>>) {
        let entry = CacheEntry {
            document: document.into(),
            captured_at: Instant::now(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        let mut entries = self.entries.write();
        entries.insert(key.into(), entry);
        self.compact_locked(&mut entries);
    }

    /// Compacts the store if it holds more than `capacity` entries.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_if_over_capacity(&self) -> usize {
        let mut entries = self.entries.write();
        self.compact_locked(&mut entries)
    }

    /// Removes all stale entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.config.ttl;
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.captured_at.elapsed() < ttl);
        before - entries.len()
    }

    /// Returns the number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Creates a background expiry sweep.
    ///
    /// Returns a future that should be spawned as a background task.
    pub fn start_sweeping(self: Arc<Self>) -> impl std::future::Future<Output = ()> + Send {
        let cache = self;
        async move {
            loop {
                tokio::time::sleep(cache.config.sweep_interval).await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, remaining = cache.len(), "Swept expired proxy cache entries");
                }
            }
        }
    }

    fn compact_locked(&self, entries: &mut HashMap<String, CacheEntry>) -> usize {
        if entries.len() <= self.config.capacity {
            return 0;
        }

        let mut by_age: Vec<(Instant, u64, String)> = entries
            .iter()
            .map(|(key, entry)| (entry.captured_at, entry.seq, key.clone()))
            .collect();
        by_age.sort_unstable();

        let excess = entries.len() - self.config.compact_target;
        for (_, _, key) in by_age.into_iter().take(excess) {
            entries.remove(&key);
        }

        debug!(evicted = excess, remaining = entries.len(), "Compacted proxy cache");
        excess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: usize) -> String {
        format!("https://res.cloudinary.com/demo/raw/upload/{}.html", i)
    }

    // ==================== TTL Tests ====================

    #[test]
    fn get_within_ttl_hits() {
        let cache = ProxyCache::default();
        cache.put(key(1), "<p>one</p>");
        assert_eq!(cache.get(&key(1)).as_deref(), Some("<p>one</p>"));
        assert_eq!(cache.get(&key(2)), None);
    }

    #[test]
    fn get_after_ttl_misses_without_deleting() {
        let cache = ProxyCache::new(ProxyCacheConfig::default().with_ttl(Duration::from_millis(30)));
        cache.put(key(1), "<p>one</p>");
        assert!(cache.get(&key(1)).is_some());

        std::thread::sleep(Duration::from_millis(60));

        assert_eq!(cache.get(&key(1)), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_overwrites_and_refreshes() {
        let cache = ProxyCache::new(ProxyCacheConfig::default().with_ttl(Duration::from_millis(50)));
        cache.put(key(1), "old");
        std::thread::sleep(Duration::from_millis(30));
        cache.put(key(1), "new");
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.get(&key(1)).as_deref(), Some("new"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn purge_expired_removes_stale_entries() {
        let cache = ProxyCache::new(ProxyCacheConfig::default().with_ttl(Duration::from_millis(30)));
        cache.put(key(1), "a");
        cache.put(key(2), "b");
        std::thread::sleep(Duration::from_millis(60));
        cache.put(key(3), "c");

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(3)).is_some());
    }

    #[test]
    fn query_string_is_part_of_the_key() {
        let cache = ProxyCache::default();
        cache.put("https://h/raw/upload/a.html?v=1", "v1");
        assert_eq!(cache.get("https://h/raw/upload/a.html?v=2"), None);
        assert_eq!(cache.get("https://h/raw/upload/a.html?v=1").as_deref(), Some("v1"));
    }

    // ==================== Eviction Tests ====================

    #[test]
    fn compaction_keeps_most_recent_entries() {
        let cache = ProxyCache::default();
        for i in 0..DEFAULT_CAPACITY {
            cache.put(key(i), format!("doc {}", i));
        }
        assert_eq!(cache.len(), DEFAULT_CAPACITY);

        cache.put(key(DEFAULT_CAPACITY), "newest");

        assert_eq!(cache.len(), DEFAULT_COMPACT_TARGET);
        for i in 0..=DEFAULT_CAPACITY - DEFAULT_COMPACT_TARGET {
            assert_eq!(cache.get(&key(i)), None, "entry {} should be evicted", i);
        }
        for i in DEFAULT_CAPACITY - DEFAULT_COMPACT_TARGET + 1..=DEFAULT_CAPACITY {
            assert!(cache.get(&key(i)).is_some(), "entry {} should survive", i);
        }
    }

    #[test]
    fn evict_if_over_capacity_is_noop_within_bounds() {
        let cache = ProxyCache::default();
        cache.put(key(1), "a");
        assert_eq!(cache.evict_if_over_capacity(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn compaction_never_empties_the_store() {
        let cache = ProxyCache::new(ProxyCacheConfig::default().with_capacity(2, 0));
        assert_eq!(cache.config().compact_target, 1);
        for i in 0..5 {
            cache.put(key(i), "x");
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(4)).is_some());
    }

    #[test]
    fn clear_empties() {
        let cache = ProxyCache::default();
        cache.put(key(1), "a");
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    // ==================== Concurrency Tests ====================

    #[test]
    fn concurrent_puts_stay_bounded() {
        let cache = Arc::new(ProxyCache::default());
        let mut handles = vec![];

        for t in 0..8 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    cache.put(key(t * 1000 + i), "x");
                    let _ = cache.get(&key(t * 1000 + i));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let len = cache.len();
        assert!(len >= 1 && len <= DEFAULT_CAPACITY, "len was {}", len);
    }

    #[tokio::test]
    async fn sweep_task_purges_in_background() {
        let config = ProxyCacheConfig::default()
            .with_ttl(Duration::from_millis(20))
            .with_sweep_interval(Duration::from_millis(10));
        let cache = Arc::new(ProxyCache::new(config));
        cache.put(key(1), "a");

        let handle = tokio::spawn(cache.clone().start_sweeping());
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(cache.is_empty());
    }
}
