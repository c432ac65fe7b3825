//! Snapshot directory resolution.

use std::env;
use std::fmt;
use std::path::PathBuf;

/// Resolves the directory that holds snapshot files.
pub trait DirResolver: fmt::Debug {
    fn dir(&self) -> PathBuf;
}

/// The system temporary directory (`TMPDIR` on Unix-like systems).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTempDir;

impl DirResolver for SystemTempDir {
    fn dir(&self) -> PathBuf {
        env::temp_dir()
    }
}

/// An explicit directory.
impl DirResolver for PathBuf {
    fn dir(&self) -> PathBuf {
        self.clone()
    }
}
