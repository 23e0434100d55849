//! Cache Module
//!
//! Two-tier value cache consulted by point lookups before any disk access.
//!
//! ## Responsibilities
//! - Keep small values in a large LRU and big values in a small LRU, so
//!   memory stays bounded whatever the value sizes are
//! - Hold each key in at most one tier, the one matching its current value
//! - Count hits and misses
//!
//! Eviction only ever drops cached copies; persisted data is untouched.

mod classifier;

pub use classifier::{SizeClass, SizeClassifier, ValueClassifier};

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

/// Hit/miss counters for point lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub small_entries: usize,
    pub big_entries: usize,
}

/// Cache policy: two LRU tiers plus the classifier that routes between them
///
/// ## Concurrency:
/// - Each tier has its own mutex because an LRU lookup reorders entries,
///   and lookups run under the engine's shared lock
pub struct ValueCache<K: Hash + Eq, V> {
    small: Mutex<LruCache<K, V>>,
    big: Mutex<LruCache<K, V>>,
    classifier: Box<dyn ValueClassifier<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> ValueCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Capacities below one are raised to one
    pub fn new(
        small_capacity: usize,
        big_capacity: usize,
        classifier: Box<dyn ValueClassifier<V>>,
    ) -> Self {
        let cap = |n: usize| NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN);
        Self {
            small: Mutex::new(LruCache::new(cap(small_capacity))),
            big: Mutex::new(LruCache::new(cap(big_capacity))),
            classifier,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look in the small tier, then the big tier
    pub fn get(&self, key: &K) -> Option<V> {
        let mut found = self.small.lock().get(key).cloned();
        if found.is_none() {
            found = self.big.lock().get(key).cloned();
        }

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Cache `value` in the tier matching its size class and drop any copy
    /// held by the other tier
    pub fn insert(&self, key: K, value: V) {
        match self.classifier.classify(&value) {
            SizeClass::Small => {
                self.big.lock().pop(&key);
                self.small.lock().put(key, value);
            }
            SizeClass::Big => {
                self.small.lock().pop(&key);
                self.big.lock().put(key, value);
            }
        }
    }

    /// Drop `key` from both tiers
    pub fn evict(&self, key: &K) {
        self.small.lock().pop(key);
        self.big.lock().pop(key);
    }

    /// Tier currently holding `key`, without touching recency
    pub fn tier_of(&self, key: &K) -> Option<SizeClass> {
        if self.small.lock().contains(key) {
            Some(SizeClass::Small)
        } else if self.big.lock().contains(key) {
            Some(SizeClass::Big)
        } else {
            None
        }
    }

    pub fn clear(&self) {
        self.small.lock().clear();
        self.big.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            small_entries: self.small.lock().len(),
            big_entries: self.big.lock().len(),
        }
    }
}
