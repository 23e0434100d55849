//! Error types for TreapDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using TreapError
pub type Result<T> = std::result::Result<T, TreapError>;

/// Unified error type for TreapDB operations
#[derive(Debug, Error)]
pub enum TreapError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage corruption detected: {0}")]
    Corruption(String),

    #[error("Record needs {needed} bytes but block size is {block_size}")]
    RecordTooLarge { needed: usize, block_size: usize },

    #[error("Store is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Query Errors
    // -------------------------------------------------------------------------
    #[error("Invalid range: {start} to {end}")]
    InvalidRange { start: String, end: String },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for TreapError {
    fn from(e: bincode::Error) -> Self {
        TreapError::Serialization(e.to_string())
    }
}
