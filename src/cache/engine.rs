//! Cache Engine Module
//!
//! In-memory map with uniform TTL expiry, persisted through the snapshot
//! store after every mutation. Expiry is lazy: a stale entry is refreshed
//! through the lookup function when one is configured, and evicted on access
//! otherwise. There is no background sweep.

use std::fmt;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheEntry, CacheState, CacheStats, Clock, SystemClock};
use crate::config::{validate_validity, CacheConfig, DEFAULT_VALIDITY};
use crate::error::{BoxError, CacheError, Result};
use crate::snapshot::{DirResolver, SnapshotStore, SystemTempDir};

/// Refresh function invoked on a miss or a stale entry.
pub type Lookup<K, V> = Arc<dyn Fn(&K) -> std::result::Result<V, BoxError> + Send + Sync>;

// == Cache ==
/// Disk-persisted key/value cache.
pub struct Cache<K, V> {
    /// Current entries
    state: CacheState<K, V>,
    /// Seconds an entry stays fresh, applied uniformly at read time
    validity: u64,
    /// Optional refresh function
    lookup: Option<Lookup<K, V>>,
    /// Durable snapshot
    store: SnapshotStore,
    clock: Box<dyn Clock>,
    stats: CacheStats,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
{
    /// Starts building a cache persisted under `filename`.
    pub fn builder(filename: impl Into<String>) -> CacheBuilder<K, V> {
        CacheBuilder::new(filename)
    }

    /// Opens a cache in the system temp directory from `config`.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        Self::builder(config.filename.clone())
            .validity(config.validity)
            .build()
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// A fresh entry is returned without I/O. Otherwise the lookup, if any,
    /// produces a new value which is stored and returned. Without a lookup a
    /// stale entry is removed and the removal persisted.
    pub fn get(&mut self, key: &K) -> Result<Option<V>> {
        let now = self.clock.now();
        let present = match self.state.get(key) {
            Some(entry) if entry.is_fresh(now, self.validity) => {
                self.stats.record_hit();
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        self.stats.record_miss();

        if let Some(lookup) = self.lookup.clone() {
            let value = lookup(key).map_err(CacheError::Lookup)?;
            self.stats.record_refresh();
            info!(stale = present, path = %self.path().display(), "Refreshed entry via lookup");
            self.set(key.clone(), value.clone())?;
            return Ok(Some(value));
        }

        if present {
            self.state.remove(key);
            self.stats.record_eviction();
            info!(path = %self.path().display(), "Evicted stale entry");
            self.persist()?;
        }

        Ok(None)
    }

    // == Set ==
    /// Stores a value, stamping it with the current time, and persists the
    /// full state before returning.
    ///
    /// Returns the cache so calls can be chained.
    pub fn set(&mut self, key: K, value: V) -> Result<&mut Self> {
        let now = self.clock.now();
        self.state.insert(key, CacheEntry::new(value, now));
        self.persist()?;
        Ok(self)
    }

    fn persist(&mut self) -> Result<()> {
        self.store.store(&self.state)?;
        self.stats.record_write();
        Ok(())
    }
}

impl<K, V> Cache<K, V> {
    // == Validity ==
    /// Returns the current validity in seconds.
    pub fn validity(&self) -> u64 {
        self.validity
    }

    /// Sets the validity in seconds. Zero is rejected.
    ///
    /// The new value applies to existing entries too, since freshness is
    /// computed at read time.
    pub fn set_validity(&mut self, secs: u64) -> Result<()> {
        validate_validity(secs)?;
        debug!(old = self.validity, new = secs, "Validity changed");
        self.validity = secs;
        Ok(())
    }

    /// Sets the validity from a duration, truncating sub-second precision.
    pub fn set_validity_duration(&mut self, validity: Duration) -> Result<()> {
        self.set_validity(validity.as_secs())
    }

    // == Lookup ==
    /// Returns the configured lookup function, if any.
    pub fn lookup(&self) -> Option<Lookup<K, V>> {
        self.lookup.clone()
    }

    /// Installs a lookup function, replacing any previous one.
    pub fn set_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&K) -> std::result::Result<V, BoxError> + Send + Sync + 'static,
    {
        self.lookup = Some(Arc::new(lookup));
    }

    /// Removes the lookup function; stale entries will be evicted again.
    pub fn clear_lookup(&mut self) {
        self.lookup = None;
    }

    // == Inspection ==
    /// Returns the stored entry for `key`, ignoring expiry.
    pub fn peek(&self, key: &K) -> Option<&CacheEntry<V>>
    where
        K: Eq + Hash,
    {
        self.state.get(key)
    }

    /// Returns the number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Iterates over stored keys, stale ones included.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.state.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Returns the snapshot path.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.state.len());
        stats
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("path", &self.store.path())
            .field("validity", &self.validity)
            .field("entries", &self.state.len())
            .field("lookup", &self.lookup.is_some())
            .finish()
    }
}

// == Cache Builder ==
/// Collects construction inputs for a [`Cache`].
pub struct CacheBuilder<K, V> {
    filename: String,
    validity: u64,
    lookup: Option<Lookup<K, V>>,
    resolver: Box<dyn DirResolver>,
    clock: Box<dyn Clock>,
}

impl<K, V> CacheBuilder<K, V> {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            validity: DEFAULT_VALIDITY,
            lookup: None,
            resolver: Box::new(SystemTempDir),
            clock: Box::new(SystemClock),
        }
    }

    /// Validity in seconds (default 300).
    pub fn validity(mut self, secs: u64) -> Self {
        self.validity = secs;
        self
    }

    pub fn lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&K) -> std::result::Result<V, BoxError> + Send + Sync + 'static,
    {
        self.lookup = Some(Arc::new(lookup));
        self
    }

    /// Directory holding the snapshot (default: system temp directory).
    pub fn resolver<R: DirResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Validates the configuration and loads the snapshot.
    pub fn build(self) -> Result<Cache<K, V>>
    where
        K: Eq + Hash + DeserializeOwned,
        V: DeserializeOwned,
    {
        let config = CacheConfig {
            filename: self.filename,
            validity: self.validity,
        };
        config.validate()?;

        let store = SnapshotStore::new(self.resolver.as_ref(), &config.filename)?;
        let state = store.load()?;
        debug!(
            path = %store.path().display(),
            entries = state.len(),
            validity = config.validity,
            "Cache opened"
        );

        Ok(Cache {
            state,
            validity: config.validity,
            lookup: self.lookup,
            store,
            clock: self.clock,
            stats: CacheStats::new(),
        })
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn create_test_cache(dir: &TempDir, clock: &ManualClock) -> Cache<String, String> {
        Cache::builder("test.json")
            .validity(10)
            .resolver(dir.path().to_path_buf())
            .clock(clock.clone())
            .build()
            .unwrap()
    }

    fn reopen(dir: &TempDir) -> Cache<String, String> {
        Cache::builder("test.json")
            .resolver(dir.path().to_path_buf())
            .build()
            .unwrap()
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_fresh_miss_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);

        assert_eq!(cache.get(&key("missing")).unwrap(), None);
        assert!(!cache.path().exists());
        assert_eq!(cache.stats().writes, 0);
    }

    #[test]
    fn test_set_and_get() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);

        cache.set(key("key1"), "value1".to_string()).unwrap();

        assert_eq!(cache.get(&key("key1")).unwrap(), Some("value1".to_string()));
        assert_eq!(cache.len(), 1);
        assert!(cache.path().exists());
    }

    #[test]
    fn test_set_chains() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);

        cache
            .set(key("a"), "1".to_string())
            .unwrap()
            .set(key("b"), "2".to_string())
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().writes, 2);
    }

    #[test]
    fn test_overwrite_resets_insert_time() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);

        cache.set(key("a"), "1".to_string()).unwrap();
        clock.set(8);
        cache.set(key("a"), "2".to_string()).unwrap();
        clock.set(15);

        let entry = cache.peek(&key("a")).unwrap();
        assert_eq!(entry.inserted_at, 8);
        assert_eq!(cache.get(&key("a")).unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_expiry_without_lookup_evicts_and_persists() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);

        cache.set(key("a"), "1".to_string()).unwrap();

        clock.set(5);
        assert_eq!(cache.get(&key("a")).unwrap(), Some("1".to_string()));

        clock.set(15);
        assert_eq!(cache.get(&key("a")).unwrap(), None);
        assert!(cache.peek(&key("a")).is_none());
        assert_eq!(cache.stats().evictions, 1);

        let reloaded = reopen(&dir);
        assert!(reloaded.peek(&key("a")).is_none());
    }

    #[test]
    fn test_expiry_with_lookup_refreshes() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);
        cache.set_lookup(|k: &String| Ok(format!("{}!", k)));

        cache.set(key("a"), "1".to_string()).unwrap();
        clock.set(15);

        assert_eq!(cache.get(&key("a")).unwrap(), Some("a!".to_string()));
        assert_eq!(cache.peek(&key("a")).unwrap().inserted_at, 15);
        assert_eq!(cache.stats().refreshes, 1);

        let reloaded = reopen(&dir);
        let entry = reloaded.peek(&key("a")).unwrap();
        assert_eq!(entry.value, "a!");
        assert_eq!(entry.inserted_at, 15);
    }

    #[test]
    fn test_lookup_fills_missing_key() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(3);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut cache: Cache<String, String> = Cache::builder("test.json")
            .resolver(dir.path().to_path_buf())
            .clock(clock.clone())
            .lookup(move |k: &String| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(k.to_uppercase())
            })
            .build()
            .unwrap();

        assert_eq!(cache.get(&key("abc")).unwrap(), Some("ABC".to_string()));
        assert_eq!(cache.get(&key("abc")).unwrap(), Some("ABC".to_string()));

        // Second get is a hit
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_lookup_error_propagates_without_mutation() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);
        cache.set_lookup(|_: &String| Err("backend down".into()));

        let result = cache.get(&key("a"));

        assert!(matches!(result, Err(CacheError::Lookup(_))));
        assert!(cache.is_empty());
        assert!(!cache.path().exists());
    }

    #[test]
    fn test_clear_lookup_restores_eviction() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);
        cache.set_lookup(|k: &String| Ok(k.clone()));
        assert!(cache.lookup().is_some());

        cache.clear_lookup();
        assert!(cache.lookup().is_none());

        cache.set(key("a"), "1".to_string()).unwrap();
        clock.set(10);
        assert_eq!(cache.get(&key("a")).unwrap(), None);
    }

    #[test]
    fn test_lookup_getter_returns_callable() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);
        cache.set_lookup(|k: &String| Ok(format!("<{}>", k)));

        let lookup = cache.lookup().unwrap();
        assert_eq!(lookup(&key("x")).unwrap(), "<x>");
    }

    #[test]
    fn test_set_validity() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);
        assert_eq!(cache.validity(), 10);

        cache.set_validity(60).unwrap();
        assert_eq!(cache.validity(), 60);

        assert!(matches!(cache.set_validity(0), Err(CacheError::Config(_))));
        assert_eq!(cache.validity(), 60);
    }

    #[test]
    fn test_set_validity_duration_truncates() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);

        cache.set_validity_duration(Duration::from_millis(2_900)).unwrap();
        assert_eq!(cache.validity(), 2);

        let result = cache.set_validity_duration(Duration::from_millis(999));
        assert!(matches!(result, Err(CacheError::Config(_))));
        assert_eq!(cache.validity(), 2);
    }

    #[test]
    fn test_validity_change_applies_to_existing_entries() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);

        cache.set(key("a"), "1".to_string()).unwrap();
        clock.set(15);
        cache.set_validity(20).unwrap();

        assert_eq!(cache.get(&key("a")).unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();

        let missing: Result<Cache<String, String>> = Cache::builder("")
            .resolver(dir.path().to_path_buf())
            .build();
        assert!(matches!(missing, Err(CacheError::Config(_))));

        let zero: Result<Cache<String, String>> = Cache::builder("x")
            .validity(0)
            .resolver(dir.path().to_path_buf())
            .build();
        assert!(matches!(zero, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_open_uses_system_temp_dir() {
        let config = CacheConfig {
            filename: format!("disk_cache_open_test_{}.json", std::process::id()),
            validity: 45,
        };
        let mut cache: Cache<String, String> = Cache::open(&config).unwrap();
        assert_eq!(cache.path(), std::env::temp_dir().join(&config.filename));
        assert_eq!(cache.validity(), 45);

        cache.set(key("a"), "1".to_string()).unwrap();
        assert!(cache.path().exists());
        std::fs::remove_file(cache.path()).unwrap();
    }

    #[test]
    fn test_default_validity() {
        let dir = TempDir::new().unwrap();
        let cache = reopen(&dir);
        assert_eq!(cache.validity(), 300);
    }

    #[test]
    fn test_set_fails_loudly_when_snapshot_cannot_be_replaced() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);

        std::fs::create_dir(cache.path()).unwrap();
        std::fs::write(cache.path().join("blocker"), b"x").unwrap();

        let result = cache.set(key("a"), "1".to_string());
        assert!(matches!(result, Err(CacheError::PersistenceWrite { .. })));
    }

    #[test]
    fn test_debug_hides_lookup() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(0);
        let mut cache = create_test_cache(&dir, &clock);
        cache.set_lookup(|k: &String| Ok(k.clone()));

        let debug = format!("{:?}", cache);
        assert!(debug.contains("validity: 10"));
        assert!(debug.contains("lookup: true"));
    }
}
