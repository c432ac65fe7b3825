//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;

use crate::error::{CacheError, Result};

/// Default entry validity in seconds
pub const DEFAULT_VALIDITY: u64 = 300;

/// Default snapshot filename used when none is configured
pub const DEFAULT_FILENAME: &str = "disk_cache.json";

/// Cache configuration parameters.
///
/// Values can be loaded from environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Snapshot filename, resolved against the snapshot directory
    pub filename: String,
    /// Seconds an entry stays fresh after it was written
    pub validity: u64,
}

impl CacheConfig {
    /// Creates a config for `filename` with the default validity.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            validity: DEFAULT_VALIDITY,
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DISK_CACHE_FILE` - Snapshot filename (default: disk_cache.json)
    /// - `DISK_CACHE_VALIDITY` - Validity in seconds (default: 300)
    pub fn from_env() -> Self {
        Self {
            filename: env::var("DISK_CACHE_FILE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
            validity: env::var("DISK_CACHE_VALIDITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_VALIDITY),
        }
    }

    /// Checks the filename and validity.
    ///
    /// The filename must be a single non-empty path segment so the snapshot
    /// always lands directly inside the resolved directory.
    pub fn validate(&self) -> Result<()> {
        validate_filename(&self.filename)?;
        validate_validity(self.validity)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FILENAME)
    }
}

pub(crate) fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(CacheError::Config("filename is required".to_string()));
    }
    if filename == "." || filename == ".." || filename.contains(['/', '\\']) {
        return Err(CacheError::Config(format!(
            "filename must be a single path segment, got '{}'",
            filename
        )));
    }
    Ok(())
}

pub(crate) fn validate_validity(validity: u64) -> Result<()> {
    if validity == 0 {
        return Err(CacheError::Config(
            "validity must be a positive number of seconds".to_string(),
        ));
    }
    Ok(())
}
