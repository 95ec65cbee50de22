//! Weight-bounded LRU caching for the query path: postings payloads and
//! decoded row-group pages. Shaped directly on the teacher's
//! `PartitionedCache`/`SharedCache` pair, generalised from
//! per-domain-TTL eviction to weight-bounded pure-LRU eviction, since
//! published index artifacts never expire — only version retention (§4.10)
//! and memory pressure evict them.

use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Instant;

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] cache mutex poisoned, cannot recover from this - aborting";

/// A convenience wrapper around a [`LruCache`] which lets it be shared
/// between threads. Cloning gives a new handle to the same cache.
#[derive(Debug, Clone)]
pub struct SharedLruCache<K: Eq + Hash + Clone, V: Clone> {
    inner: Arc<Mutex<LruCache<K, V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> SharedLruCache<K, V> {
    pub fn with_desired_weight(desired_weight: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LruCache::with_desired_weight(desired_weight))),
        }
    }

    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).get(key)
    }

    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn insert(&self, key: K, value: V, weight: u64) {
        self.inner
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .insert(key, value, weight);
    }

    /// Evicts least-recently-used entries until `current_weight <=
    /// desired_weight`. Returns `(current_weight, num_evicted)`.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn prune(&self) -> (u64, usize) {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).prune()
    }

    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn len(&self) -> usize {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Weight-bounded least-recently-used cache. Insertion may push
/// `current_weight` above `desired_weight`; call `prune` to bring it
/// back down. The cache never evicts on its own, mirroring the
/// teacher's explicit `prune()` step rather than evicting inline on
/// every insert.
#[derive(Debug)]
struct LruCache<K: Eq + Hash + Clone, V: Clone> {
    entries: HashMap<K, (V, u64)>,
    access_priority: PriorityQueue<K, Reverse<Instant>>,
    current_weight: u64,
    desired_weight: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    fn with_desired_weight(desired_weight: u64) -> Self {
        Self {
            entries: HashMap::new(),
            access_priority: PriorityQueue::new(),
            current_weight: 0,
            desired_weight,
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        if let Some((value, _)) = self.entries.get(key) {
            let value = value.clone();
            self.access_priority
                .change_priority(key, Reverse(Instant::now()));
            Some(value)
        } else {
            None
        }
    }

    fn insert(&mut self, key: K, value: V, weight: u64) {
        if let Some((_, old_weight)) = self.entries.insert(key.clone(), (value, weight)) {
            self.current_weight = self.current_weight - old_weight + weight;
            self.access_priority
                .change_priority(&key, Reverse(Instant::now()));
        } else {
            self.current_weight += weight;
            self.access_priority.push(key, Reverse(Instant::now()));
        }
    }

    fn prune(&mut self) -> (u64, usize) {
        let mut evicted = 0;
        while self.current_weight > self.desired_weight {
            let Some((key, _)) = self.access_priority.pop() else {
                break;
            };
            if let Some((_, weight)) = self.entries.remove(&key) {
                self.current_weight -= weight;
                evicted += 1;
            }
        }
        (self.current_weight, evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_after_insert_returns_value() {
        let cache: SharedLruCache<u64, String> = SharedLruCache::with_desired_weight(1024);
        cache.insert(1, "a".to_string(), 10);
        assert_eq!(cache.get(&1), Some("a".to_string()));
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn prune_evicts_least_recently_used_until_under_budget() {
        let cache: SharedLruCache<u64, String> = SharedLruCache::with_desired_weight(25);
        cache.insert(1, "a".to_string(), 10);
        cache.insert(2, "b".to_string(), 10);
        cache.insert(3, "c".to_string(), 10);

        // touch key 1 so it is most-recently-used and survives
        assert_eq!(cache.get(&1), Some("a".to_string()));

        let (current_weight, evicted) = cache.prune();
        assert!(current_weight <= 25);
        assert_eq!(evicted, 1);
        assert_eq!(cache.get(&1), Some("a".to_string()));
    }

    #[test]
    fn reinsert_updates_weight_without_duplicate_entry() {
        let cache: SharedLruCache<u64, String> = SharedLruCache::with_desired_weight(1024);
        cache.insert(1, "a".to_string(), 10);
        cache.insert(1, "aa".to_string(), 20);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&1), Some("aa".to_string()));
    }
}
