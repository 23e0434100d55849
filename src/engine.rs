//! Engine Module
//!
//! The public face of the store: wires the treap, the value cache and the
//! concurrency gate together.
//!
//! ## Responsibilities
//! - Serialize writers against readers with a single RwLock
//! - Route point lookups through the value cache
//! - Run range/prefix/order-statistics queries straight off the tree
//! - Execute protocol commands for the service layer

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheStats, SizeClassifier, ValueCache, ValueClassifier};
use crate::config::Config;
use crate::error::Result;
use crate::protocol::{Command, Reply};
use crate::storage::{BlockStore, FileBlockStore};
use crate::treap::{PriorityGenerator, RandomPriority, Treap};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put): exclusive `gate` for the whole operation, covering
///   the header read, the descent with its node writes and rotations, the
///   final header update, and the cache update
/// - **Reads** (get/range/prefix/kmin/kmax/length): shared `gate`; readers
///   run concurrently with each other, never with a writer
///
/// A crash in the middle of a put can leave partially written rotations
/// behind; there is no write-ahead log.
pub struct Engine<K, V, S = FileBlockStore<K, V>>
where
    K: Hash + Eq,
{
    /// Engine configuration
    config: Config,

    /// The tree and its block store, behind the concurrency gate
    gate: RwLock<Treap<K, V, S>>,

    /// Two-tier cache for point lookups
    cache: ValueCache<K, V>,
}

impl<K, V> Engine<K, V, FileBlockStore<K, V>>
where
    K: Ord + Hash + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Open or create a file-backed engine
    pub fn open(config: Config) -> Result<Self> {
        let store = FileBlockStore::open(&config.index_path, config.block_size)?;

        let priorities: Box<dyn PriorityGenerator> = match config.priority_seed {
            Some(seed) => Box::new(RandomPriority::seeded(seed)),
            None => Box::new(RandomPriority::new()),
        };

        tracing::debug!(
            "Opening engine at {} (block_size={}, mmap hint={} bytes)",
            config.index_path.display(),
            config.block_size,
            config.mmap_size
        );

        let classifier = Box::new(SizeClassifier::new(config.small_value_threshold));
        Ok(Self::with_store(store, priorities, classifier, config))
    }
}

impl<K, V, S> Engine<K, V, S>
where
    K: Ord + Hash + Clone + Debug,
    V: Clone,
    S: BlockStore<K, V>,
{
    /// Build an engine over any block store, priority source and classifier
    pub fn with_store(
        store: S,
        priorities: Box<dyn PriorityGenerator>,
        classifier: Box<dyn ValueClassifier<V>>,
        config: Config,
    ) -> Self {
        let cache = ValueCache::new(
            config.small_cache_capacity,
            config.big_cache_capacity,
            classifier,
        );

        Self {
            config,
            gate: RwLock::new(Treap::new(store, priorities)),
            cache,
        }
    }

    /// Insert or update a key-value pair
    ///
    /// Steps:
    /// 1. Acquire the write gate
    /// 2. Insert into the tree (rotations persist as they happen)
    /// 3. Record the value in the matching cache tier
    pub fn put(&self, key: K, value: V) -> Result<()> {
        let mut treap = self.gate.write();

        treap.put(key.clone(), value.clone())?;
        self.cache.insert(key, value);
        Ok(())
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. Small-value cache, then big-value cache
    /// 2. The tree on disk, caching whatever is found
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let treap = self.gate.read();

        if let Some(value) = self.cache.get(key) {
            return Ok(Some(value));
        }

        let value = treap.get(key)?;
        if let Some(value) = &value {
            self.cache.insert(key.clone(), value.clone());
        }
        Ok(value)
    }

    /// Entries with `start <= key < end`, at most `limit`
    ///
    /// Fails with `InvalidRange` when `start >= end`.
    pub fn range(&self, start: &K, end: &K, limit: usize) -> Result<BTreeMap<K, V>> {
        self.gate.read().range(start, end, limit)
    }

    /// The `k` smallest entries
    pub fn kmin(&self, k: u64) -> Result<BTreeMap<K, V>> {
        self.gate.read().kmin(k)
    }

    /// The `k` largest entries
    pub fn kmax(&self, k: u64) -> Result<BTreeMap<K, V>> {
        self.gate.read().kmax(k)
    }

    /// Number of entries
    pub fn length(&self) -> Result<u64> {
        self.gate.read().length()
    }

    /// Remove a key
    ///
    /// Deletion is not supported: the call is accepted, changes nothing and
    /// always reports `false`.
    pub fn remove(&self, key: &K) -> Result<bool> {
        tracing::debug!("remove({:?}) ignored: deletion is not supported", key);
        Ok(false)
    }

    /// Walk the whole tree and verify its invariants, returning the node count
    pub fn check_invariants(&self) -> Result<u64> {
        self.gate.read().check_invariants()
    }

    /// Point lookup hit/miss counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Close the underlying block store
    ///
    /// Later operations fail with `Closed`. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut treap = self.gate.write();
        self.cache.clear();
        treap.close()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `f` against the block store while holding the shared gate
    pub fn inspect_store<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        f(self.gate.read().store())
    }
}

impl<K, V, S> Engine<K, V, S>
where
    K: Ord + Hash + Clone + Debug + AsRef<str>,
    V: Clone,
    S: BlockStore<K, V>,
{
    /// Entries whose key starts with `prefix`, at most `limit`
    pub fn prefix(&self, prefix: &K, limit: usize) -> Result<BTreeMap<K, V>> {
        self.gate.read().prefix(prefix, limit)
    }
}

impl<S> Engine<String, Vec<u8>, S>
where
    S: BlockStore<String, Vec<u8>>,
{
    /// Execute a protocol command
    ///
    /// Routes commands to appropriate handlers
    pub fn execute(&self, command: Command) -> Result<Reply> {
        match command {
            Command::Get { key } => Ok(Reply::Value(self.get(&key)?)),
            Command::Put { key, value } => {
                self.put(key, value)?;
                Ok(Reply::Stored)
            }
            Command::Remove { key } => Ok(Reply::Removed(self.remove(&key)?)),
            Command::Ping => Ok(Reply::Pong),
            Command::Range { start, end, limit } => {
                Ok(Reply::Entries(self.range(&start, &end, limit as usize)?))
            }
            Command::Prefix { prefix, limit } => {
                Ok(Reply::Entries(self.prefix(&prefix, limit as usize)?))
            }
            Command::KMin { k } => Ok(Reply::Entries(self.kmin(u64::from(k))?)),
            Command::KMax { k } => Ok(Reply::Entries(self.kmax(u64::from(k))?)),
            Command::Length => Ok(Reply::Length(self.length()?)),
        }
    }
}
