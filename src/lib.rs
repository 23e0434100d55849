//! # TreapDB
//!
//! An embedded, disk-backed ordered key-value store with:
//! - A persistent treap whose nodes live in fixed-size file slots
//! - Range, prefix and order-statistics (k-min / k-max) queries
//! - A two-tier LRU value cache split by value size
//! - Single-writer/multi-reader concurrency model
//! - TCP binary and text protocols
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                TCP Server (binary + text)                    │
//! │                    (Worker Pool)                             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │            (Single Writer / Multi Reader gate)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Value Cache │          │    Treap    │
//!   │ (small/big) │          │ (+ queries) │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │ Block Store │
//!                           │   (slots)   │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod treap;
pub mod cache;
pub mod network;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{TreapError, Result};
pub use config::Config;
pub use engine::Engine;

/// The engine served over the network: string keys, byte values, file storage
pub type Database = Engine<String, Vec<u8>>;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TreapDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
