//! Per-entity read-through cache
//!
//! Maps a primary lookup key to the full document. Entries are filled on read
//! misses and after inserts, and evicted on updates and deletes; there is no
//! TTL and no size bound.
//!
//! Every fill is fenced by a [`Ticket`] taken before the database call. Every
//! invalidation bumps an epoch, and [`EntityCache::fill`] drops the value if
//! the epoch moved, so neither a slow reader nor a slow insert can put back a
//! value another writer just evicted.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::trace;

/// Proof of the cache epoch at the time of a miss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Hit/miss counters and size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, V>,
    epoch: u64,
}

pub struct EntityCache<K, V> {
    name: &'static str,
    inner: Mutex<Inner<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> EntityCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Display,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                epoch: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached value on a hit, or a ticket to fill the entry on a miss.
    pub fn lookup(&self, key: &K) -> Result<V, Ticket> {
        let inner = self.lock();
        match inner.entries.get(key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(cache = self.name, %key, "hit");
                Ok(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(cache = self.name, %key, "miss");
                Err(Ticket(inner.epoch))
            }
        }
    }

    /// Store a value read from the database; returns false if a write
    /// happened since `ticket` was taken.
    pub fn fill(&self, key: K, value: V, ticket: Ticket) -> bool {
        let mut inner = self.lock();
        if inner.epoch != ticket.0 {
            trace!(cache = self.name, %key, "stale fill dropped");
            return false;
        }
        inner.entries.insert(key, value);
        true
    }

    /// Current epoch, taken by a writer before its database write so the
    /// written value is only cached if no other write landed in between.
    pub fn ticket(&self) -> Ticket {
        Ticket(self.lock().epoch)
    }

    /// Evict `key` and fence off in-flight fills.
    pub fn invalidate(&self, key: &K) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.entries.remove(key);
    }

    /// Cached value without touching the counters.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.lock().entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> EntityCache<String, u32> {
        EntityCache::new("test")
    }

    #[test]
    fn miss_then_fill_then_hit() {
        let cache = cache();
        let ticket = cache.lookup(&"US".into()).unwrap_err();
        assert!(cache.fill("US".into(), 1, ticket));
        assert_eq!(cache.lookup(&"US".into()), Ok(1));
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
    }

    #[test]
    fn invalidation_rejects_in_flight_fill() {
        let cache = cache();
        let ticket = cache.lookup(&"US".into()).unwrap_err();
        // A writer evicts while the reader is still querying
        cache.invalidate(&"US".into());
        assert!(!cache.fill("US".into(), 1, ticket));
        assert_eq!(cache.peek(&"US".into()), None);
    }

    #[test]
    fn writer_ticket_does_not_touch_counters() {
        let cache = cache();
        let ticket = cache.ticket();
        assert!(cache.fill("US".into(), 1, ticket));
        assert_eq!(cache.stats().misses, 0);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn writer_fill_loses_to_later_eviction() {
        let cache = cache();
        // Inserting writer takes its ticket, then a delete evicts the key
        let ticket = cache.ticket();
        cache.invalidate(&"US".into());
        assert!(!cache.fill("US".into(), 1, ticket));
        assert_eq!(cache.peek(&"US".into()), None);
    }

    #[test]
    fn clear_empties_cache() {
        let cache = cache();
        assert!(cache.fill("US".into(), 1, cache.ticket()));
        assert!(cache.fill("CA".into(), 2, cache.ticket()));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
