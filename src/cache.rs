use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory cache with a fixed per-instance TTL. Entries expire lazily:
/// a read past the deadline evicts the entry and reports a miss. There is
/// no background sweep and nothing is persisted.
pub struct Cache<K, V> {
    ttl: Duration,
    entries: HashMap<K, Entry<V>>,
}

impl<K: Eq + Hash, V: Clone> Cache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Cache {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns the live value for `key`, or `None`. An entry whose expiry
    /// has passed is never returned, even within the same read.
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&mut self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(key, Entry { value, expires_at });
    }

    pub fn remove(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_within_ttl() {
        let mut cache = Cache::new(Duration::from_secs(60));
        cache.set("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn expired_entry_is_absent_and_evicted() {
        let mut cache = Cache::new(Duration::from_millis(10));
        cache.set("a", 1);
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(cache.get(&"a"), None);
        // evicted, not just hidden
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn set_refreshes_expiry() {
        let mut cache = Cache::new(Duration::from_millis(40));
        cache.set("a", 1);
        std::thread::sleep(Duration::from_millis(25));
        cache.set("a", 2);
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[test]
    fn clear_and_remove() {
        let mut cache = Cache::new(Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.remove(&"a");
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        cache.clear();
        assert_eq!(cache.get(&"b"), None);
    }
}
