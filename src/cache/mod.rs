//! Cache Module
//!
//! Provides the disk-backed cache engine with TTL expiry and lazy refresh.

mod clock;
mod engine;
mod entry;
mod stats;


use std::collections::HashMap;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Cache, CacheBuilder, Lookup};
pub use entry::CacheEntry;
pub use stats::CacheStats;

/// In-memory cache contents, keyed by cache key.
pub type CacheState<K, V> = HashMap<K, CacheEntry<V>>;
