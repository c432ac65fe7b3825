//! Snapshot Module
//!
//! Durable representation of the cache: loaded once when a cache opens and
//! replaced atomically on every persisted mutation.

mod location;
mod store;

pub use location::{DirResolver, SystemTempDir};
pub use store::{SnapshotStore, StagedSnapshot};
