//! Error types for the disk cache
//!
//! Provides unified error handling using thiserror.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by a lookup function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Unified error type for the disk cache.
///
/// Every variant is fatal for the operation that raised it; nothing is
/// retried or recovered inside the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid construction input or setter argument
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Snapshot file exists but could not be read
    #[error("Snapshot {path} exists but is unreadable: {source}")]
    UnreadableSnapshot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Snapshot file was read but could not be decoded
    #[error("Snapshot {path} is corrupt or incompatible: {source}")]
    CorruptSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Temporary file write or atomic rename failed
    #[error("Failed to persist snapshot {path}: {source}")]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The caller-supplied lookup function failed
    #[error("Lookup failed: {0}")]
    Lookup(#[source] BoxError),
}

// == Result Type Alias ==
/// Convenience Result type for the disk cache.
pub type Result<T> = std::result::Result<T, CacheError>;
