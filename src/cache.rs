//! Metrics cache (C9, spec §4.8): TTL-keyed in-process cache for expensive
//! read-mostly values (route summaries, fleet stats) with periodic sweeping.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// A single shared TTL cache keyed by string, values stored as JSON so callers don't
/// need a generic parameter per metric kind.
pub struct MetricsCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    hits: Mutex<u64>,
    misses: Mutex<u64>,
}

impl MetricsCache {
    pub fn new(ttl: Duration) -> Self {
        MetricsCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
            hits: Mutex::new(0),
            misses: Mutex::new(0),
        }
    }

    pub fn put(&self, key: impl Into<String>, value: serde_json::Value) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.lock().unwrap().insert(key.into(), Entry { value, expires_at });
    }

    /// Returns the cached value if present and not expired. A stale hit counts as a
    /// miss and is evicted lazily.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut guard = self.entries.lock().unwrap();
        match guard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                *self.hits.lock().unwrap() += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                guard.remove(key);
                *self.misses.lock().unwrap() += 1;
                None
            }
            None => {
                *self.misses.lock().unwrap() += 1;
                None
            }
        }
    }

    /// Drops every expired entry. Intended to be called by a periodic sweep tick
    /// (`CacheConfig::sweep_ms`) rather than on every read.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.entries.lock().unwrap();
        let before = guard.len();
        guard.retain(|_, entry| entry.expires_at > now);
        before - guard.len()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: *self.hits.lock().unwrap(),
            misses: *self.misses.lock().unwrap(),
            entries: self.entries.lock().unwrap().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_expire_then_miss() {
        let cache = MetricsCache::new(Duration::from_millis(20));
        cache.put("k", serde_json::json!({"v": 1}));
        assert!(cache.get("k").is_some());

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("k").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn sweep_evicts_expired_entries() {
        let cache = MetricsCache::new(Duration::from_millis(10));
        cache.put("a", serde_json::json!(1));
        cache.put("b", serde_json::json!(2));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.sweep(), 2);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = MetricsCache::new(Duration::from_secs(60));
        assert!(cache.get("nope").is_none());
        assert_eq!(cache.stats().misses, 1);
    }
}
