//! Bounded TTL cache with least-recently-used eviction.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A key/value store holding at most `max_entries` values, each for `ttl`.
///
/// Expired entries are never returned; they are purged when looked up.
/// Recency is updated by reads as well as writes, so on overflow the entry
/// that was least recently *accessed* goes first. Every operation takes the
/// lock once and does O(1) work under it.
pub struct TtlCache<K, V> {
    entries: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// A `max_entries` of zero is treated as one.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            ttl,
            max_entries: cap.get(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<K, Entry<V>>> {
        // A panic while holding the guard cannot leave the map half-written.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        let expired = entries.peek(key)?.is_expired(now);
        if expired {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|e| e.value.clone())
    }

    /// Insert or replace `key` with a fresh expiry of `now + ttl`.
    pub fn set(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.lock().put(key, Entry { value, expires_at });
    }

    /// Replace `key` with `f(current)` under a single lock and return the new
    /// value. Expired entries are seen as absent. The entry gets a fresh expiry.
    pub fn update(&self, key: K, f: impl FnOnce(Option<&V>) -> V) -> V {
        let now = Instant::now();
        let mut entries = self.lock();
        let current = entries
            .peek(&key)
            .filter(|e| !e.is_expired(now))
            .map(|e| &e.value);
        let value = f(current);
        entries.put(
            key,
            Entry {
                value: value.clone(),
                expires_at: now + self.ttl,
            },
        );
        value
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .pop(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value)
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `f` applied to every live entry, most recently used first. Values are
    /// borrowed, not cloned, and recency is left untouched.
    pub fn map_live<R>(&self, mut f: impl FnMut(&K, &V) -> R) -> Vec<R> {
        let now = Instant::now();
        self.lock()
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, e)| f(k, &e.value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn get_within_ttl_returns_value() {
        let cache = TtlCache::new(4, Duration::from_secs(60));
        cache.set("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn get_after_ttl_is_absent_and_purged() {
        let cache = TtlCache::new(4, Duration::from_secs(60));
        cache.set("a", 1);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn set_refreshes_expiry() {
        let cache = TtlCache::new(4, Duration::from_secs(60));
        cache.set("a", 1);
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.set("a", 2);
        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[test]
    fn overflow_evicts_least_recently_accessed() {
        let cache = TtlCache::new(3, Duration::from_secs(60));
        cache.set(1, "one");
        cache.set(2, "two");
        cache.set(3, "three");

        // Reading 1 makes 2 the least recently used.
        assert_eq!(cache.get(&1), Some("one"));
        cache.set(4, "four");

        assert_eq!(cache.size(), 3);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some("one"));
        assert_eq!(cache.get(&3), Some("three"));
        assert_eq!(cache.get(&4), Some("four"));
    }

    #[test]
    fn size_never_exceeds_max() {
        let cache = TtlCache::new(10, Duration::from_secs(60));
        for i in 0..100 {
            cache.set(i, i);
            assert!(cache.size() <= 10);
        }
        assert_eq!(cache.get(&89), None);
        assert_eq!(cache.get(&90), Some(90));
    }

    #[test]
    fn remove_deletes_entry() {
        let cache = TtlCache::new(2, Duration::from_secs(60));
        cache.set("k", "v");
        assert_eq!(cache.remove(&"k"), Some("v"));
        assert_eq!(cache.get(&"k"), None);
        assert_eq!(cache.remove(&"k"), None);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let cache = TtlCache::new(0, Duration::from_secs(60));
        cache.set(1, 1);
        cache.set(2, 2);
        assert_eq!(cache.max_entries(), 1);
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get(&2), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn map_live_skips_expired() {
        let cache = TtlCache::new(4, Duration::from_secs(10));
        cache.set("old", vec![1]);
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.set("new", vec![2, 3]);
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.map_live(|k, v| (*k, v.len())), vec![("new", 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn update_sees_current_value_and_refreshes_expiry() {
        let cache = TtlCache::new(4, Duration::from_secs(10));
        assert_eq!(cache.update("k", |v| v.copied().unwrap_or(0) + 1), 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.update("k", |v| v.copied().unwrap_or(0) + 1), 2);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get(&"k"), Some(2));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.update("k", |v| v.copied().unwrap_or(0) + 1), 1);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let cache = std::sync::Arc::new(TtlCache::new(4, Duration::from_secs(60)));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cache.update(7u64, |v| v.copied().unwrap_or(0u32) + 1);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(cache.get(&7), Some(800));
    }
}
