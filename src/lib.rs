//! Disk Cache - a single-process key/value cache persisted to disk
//!
//! Entries expire after a uniform validity window. Stale entries are either
//! refreshed through a caller-supplied lookup function or evicted on access,
//! and every mutation atomically replaces the on-disk snapshot so short-lived
//! processes can share cache state across invocations.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod snapshot;

pub use cache::{
    Cache, CacheBuilder, CacheEntry, CacheState, CacheStats, Clock, Lookup, ManualClock, SystemClock,
};
pub use config::CacheConfig;
pub use error::{BoxError, CacheError, Result};
pub use snapshot::{DirResolver, SnapshotStore, StagedSnapshot, SystemTempDir};
