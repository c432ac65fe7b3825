//! Command-line interface parsing for the disk_cache binary
//!
//! Flags override the environment-derived configuration so cron jobs can set
//! defaults once and scripts can still pick a cache per call.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::CacheConfig;

/// Disk Cache - a key/value cache that survives between process runs
#[derive(Parser, Debug)]
#[command(name = "disk_cache")]
#[command(about = "Persistent key/value cache with TTL expiry")]
#[command(version)]
pub struct Cli {
    /// Snapshot filename inside the cache directory (env: DISK_CACHE_FILE)
    #[arg(long, short = 'f', value_name = "NAME")]
    pub file: Option<String>,

    /// Seconds an entry stays fresh (env: DISK_CACHE_VALIDITY)
    #[arg(long, short = 'v', value_name = "SECS")]
    pub validity: Option<u64>,

    /// Directory holding the snapshot (default: the system temp directory)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the value for KEY; exits with status 1 when absent or expired
    Get { key: String },
    /// Store VALUE under KEY
    Set { key: String, value: String },
    /// Print the resolved snapshot path
    Path,
}

impl Cli {
    /// Applies command-line overrides on top of `base`.
    pub fn resolve_config(&self, base: CacheConfig) -> CacheConfig {
        CacheConfig {
            filename: self.file.clone().unwrap_or(base.filename),
            validity: self.validity.unwrap_or(base.validity),
        }
    }
}
