//! Cache Entry Module
//!
//! Defines the structure for individual cache entries and the freshness check.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// Represents a single cache entry with its value and write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Time of the most recent write (Unix seconds)
    pub inserted_at: i64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry written at `now`.
    pub fn new(value: V, now: i64) -> Self {
        Self {
            value,
            inserted_at: now,
        }
    }

    // == Expiry ==
    /// Returns the Unix second at which the entry stops being fresh.
    pub fn expires_at(&self, validity: u64) -> i64 {
        let validity = i64::try_from(validity).unwrap_or(i64::MAX);
        self.inserted_at.saturating_add(validity)
    }

    // == Is Fresh ==
    /// Checks whether the entry is still fresh at `now`.
    ///
    /// Boundary condition: an entry is stale once `now` reaches
    /// `inserted_at + validity`, so a full validity window has elapsed.
    pub fn is_fresh(&self, now: i64, validity: u64) -> bool {
        now < self.expires_at(validity)
    }

    /// Returns the write time as a UTC datetime.
    pub fn inserted_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.inserted_at, 0).single()
    }
}
