//! Configuration for TreapDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a TreapDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Index file holding the header and every node slot
    pub index_path: PathBuf,

    /// Fixed size of one node record on disk (in bytes)
    pub block_size: usize,

    /// Memory-mapping size hint. Accepted for compatibility with existing
    /// deployments; the file store uses positioned reads and writes.
    pub mmap_size: u64,

    /// Seed for node priorities. `None` draws from OS entropy.
    pub priority_seed: Option<u64>,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the cache for small values (entries)
    pub small_cache_capacity: usize,

    /// Capacity of the cache for big values (entries)
    pub big_cache_capacity: usize,

    /// Values whose serialized size is at most this many bytes are "small"
    pub small_value_threshold: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address for the binary protocol
    pub listen_addr: String,

    /// Optional TCP listen address for the text command protocol
    pub text_listen_addr: Option<String>,

    /// Worker threads serving connections
    pub worker_threads: usize,

    /// Max connections waiting for a worker
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

impl Config {
    /// Default node record size
    pub const DEFAULT_BLOCK_SIZE: usize = 440;

    /// Default mmap size hint (64 MB)
    pub const DEFAULT_MMAP_SIZE: u64 = 64 << 20;
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./treapdb_data/index.db"),
            block_size: Self::DEFAULT_BLOCK_SIZE,
            mmap_size: Self::DEFAULT_MMAP_SIZE,
            priority_seed: None,
            small_cache_capacity: 100_000,
            big_cache_capacity: 100,
            small_value_threshold: 1024,
            listen_addr: "127.0.0.1:11811".to_string(),
            text_listen_addr: None,
            worker_threads: 16,
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the index file path
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    /// Set the node record size (in bytes)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the mmap size hint (in bytes)
    pub fn mmap_size(mut self, size: u64) -> Self {
        self.config.mmap_size = size;
        self
    }

    /// Seed node priorities for reproducible tree shapes
    pub fn priority_seed(mut self, seed: u64) -> Self {
        self.config.priority_seed = Some(seed);
        self
    }

    /// Set the small-value cache capacity (entries)
    pub fn small_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.small_cache_capacity = capacity;
        self
    }

    /// Set the big-value cache capacity (entries)
    pub fn big_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.big_cache_capacity = capacity;
        self
    }

    /// Set the small/big value threshold (serialized bytes)
    pub fn small_value_threshold(mut self, bytes: usize) -> Self {
        self.config.small_value_threshold = bytes;
        self
    }

    /// Set the binary protocol listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Enable the text protocol on the given address
    pub fn text_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.text_listen_addr = Some(addr.into());
        self
    }

    /// Set the number of worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the maximum number of pending connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
