use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Bounded key→value store. Entries expire `ttl` after insertion; when full,
/// the least recently used entry is evicted.
pub struct TtlCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn insert_at(&self, key: K, value: V, now: Instant) {
        let expires_at = now + self.ttl;
        self.entries.lock().put(key, Entry { value, expires_at });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_before_expiry() {
        let cache = TtlCache::new(4, Duration::from_secs(60));
        cache.insert("INFY".to_string(), 1500);
        assert_eq!(cache.get(&"INFY".to_string()), Some(1500));
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let cache = TtlCache::new(4, Duration::from_secs(60));
        let start = Instant::now();
        cache.insert_at("INFY".to_string(), 1500, start);

        let later = start + Duration::from_secs(61);
        assert_eq!(cache.get_at(&"INFY".to_string(), later), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("A", 1);
        cache.insert("B", 2);

        // Touch A so B becomes the eviction candidate.
        assert_eq!(cache.get(&"A"), Some(1));
        cache.insert("C", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"B"), None);
        assert_eq!(cache.get(&"A"), Some(1));
        assert_eq!(cache.get(&"C"), Some(3));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache: TtlCache<&str, i32> = TtlCache::new(0, Duration::from_secs(1));
        assert_eq!(cache.capacity(), 1);
    }
}
