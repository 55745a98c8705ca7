//! Generic durable key/value repository.
//!
//! A [`PersistentRepository`] keeps its whole state in an ordered in-memory map
//! guarded by a single `RwLock`. The map is loaded once at startup with
//! [`restore`](PersistentRepository::restore) and written back as one snapshot by
//! [`flush`](PersistentRepository::flush), periodically and at shutdown.
//!
//! Serialization is pluggable through [`SnapshotCodec`]; the default is
//! [`JsonCodec`]. Lookups of missing keys are answered by a default-value policy
//! supplied at construction.
//!
//! Snapshots are written to `<file>.tmp` and renamed over the target, so a crash
//! mid-write leaves the previous snapshot intact.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::repository::{DurableRepository, ErrorContext, RepositoryError, RepositoryResult};

/// Error produced by a codec.
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// Converts a whole repository map to and from bytes.
pub trait SnapshotCodec<K, V>: Send + Sync {
    fn encode(&self, entries: &BTreeMap<K, V>) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<BTreeMap<K, V>, CodecError>;
}

/// JSON snapshots via `serde_json`.
pub struct JsonCodec<K, V> {
    pretty: bool,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> JsonCodec<K, V> {
    pub fn new() -> Self {
        Self {
            pretty: false,
            _types: PhantomData,
        }
    }

    /// Indented output, easier to inspect by hand.
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            _types: PhantomData,
        }
    }
}

impl<K, V> Default for JsonCodec<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SnapshotCodec<K, V> for JsonCodec<K, V>
where
    K: Serialize + DeserializeOwned + Ord,
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, entries: &BTreeMap<K, V>) -> Result<Vec<u8>, CodecError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(entries)?
        } else {
            serde_json::to_vec(entries)?
        };
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<BTreeMap<K, V>, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

type DefaultPolicy<K, V> = Box<dyn Fn(&K) -> V + Send + Sync>;

/// Durable ordered map snapshotted to a single file.
pub struct PersistentRepository<K, V> {
    name: String,
    path: PathBuf,
    entries: RwLock<BTreeMap<K, V>>,
    dirty: AtomicBool,
    flush_lock: Mutex<()>,
    codec: Box<dyn SnapshotCodec<K, V>>,
    default_value: DefaultPolicy<K, V>,
}

impl<K, V> PersistentRepository<K, V>
where
    K: Ord + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create an empty repository backed by `path`, using JSON snapshots.
    ///
    /// Nothing is read until [`restore`](Self::restore) is called.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        default_value: impl Fn(&K) -> V + Send + Sync + 'static,
    ) -> Self {
        Self::with_codec(name, path, JsonCodec::new(), default_value)
    }
}

impl<K, V> PersistentRepository<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    /// Create an empty repository with an explicit codec.
    pub fn with_codec(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        codec: impl SnapshotCodec<K, V> + 'static,
        default_value: impl Fn(&K) -> V + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            entries: RwLock::new(BTreeMap::new()),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
            codec: Box::new(codec),
            default_value: Box::new(default_value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ==================== Reads ====================

    /// Value for `key`, or the default-value policy's answer when absent.
    ///
    /// The default is not inserted.
    pub fn get(&self, key: &K) -> V {
        self.find(key)
            .unwrap_or_else(|| (self.default_value)(key))
    }

    /// Value for `key` if present.
    pub fn find(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Vec<K> {
        self.entries.read().keys().cloned().collect()
    }

    /// All entries in ascending key order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Entries whose key lies in `range` (inclusive), ascending.
    pub fn range(&self, range: RangeInclusive<K>) -> Vec<(K, V)> {
        if range.start() > range.end() {
            return Vec::new();
        }
        self.entries
            .read()
            .range(range)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Run `f` against a consistent view of the map without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&BTreeMap<K, V>) -> R) -> R {
        f(&self.entries.read())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether a write happened since the last successful flush or restore.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    // ==================== Writes ====================

    /// Insert or replace a value.
    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.write();
        entries.insert(key, value);
        self.dirty.store(true, Ordering::Release);
    }

    /// Atomically modify the value for `key`, creating it from the default
    /// policy first when absent.
    pub fn update<R>(&self, key: K, f: impl FnOnce(&mut V) -> R) -> R {
        let mut entries = self.entries.write();
        let value = entries
            .entry(key)
            .or_insert_with_key(|k| (self.default_value)(k));
        let result = f(value);
        self.dirty.store(true, Ordering::Release);
        result
    }

    /// Atomically modify several entries at once.
    pub fn update_all<R>(&self, f: impl FnOnce(&mut BTreeMap<K, V>) -> R) -> R {
        let mut entries = self.entries.write();
        let result = f(&mut entries);
        self.dirty.store(true, Ordering::Release);
        result
    }

    /// Like [`update_all`](Self::update_all), but the repository only becomes
    /// dirty when `f` reports that it changed something.
    pub fn update_all_if_changed(&self, f: impl FnOnce(&mut BTreeMap<K, V>) -> bool) -> bool {
        let mut entries = self.entries.write();
        let changed = f(&mut entries);
        if changed {
            self.dirty.store(true, Ordering::Release);
        }
        changed
    }

    // ==================== Persistence ====================

    /// Load the backing snapshot, replacing the in-memory map.
    ///
    /// A missing file is a fresh start. A file that exists but cannot be read or
    /// parsed is a `PersistenceError`; the in-memory map is left untouched.
    pub fn restore(&self) -> RepositoryResult<usize> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!(
                    "No snapshot for repository '{}' at {}, starting empty",
                    self.name,
                    self.path.display()
                );
                let mut entries = self.entries.write();
                entries.clear();
                self.dirty.store(false, Ordering::Release);
                return Ok(0);
            }
            Err(e) => {
                return Err(self.persistence_error("restore", "Failed to read snapshot", e));
            }
        };

        let restored = self
            .codec
            .decode(&bytes)
            .map_err(|e| self.persistence_error("restore", "Failed to parse snapshot", e))?;
        let count = restored.len();

        *self.entries.write() = restored;
        self.dirty.store(false, Ordering::Release);
        log::info!(
            "Restored {} entries into repository '{}' from {}",
            count,
            self.name,
            self.path.display()
        );
        Ok(count)
    }

    /// Write the entire current map to the backing file.
    ///
    /// The map is encoded under the read lock, so a concurrent writer either
    /// lands entirely before or entirely after the snapshot.
    pub fn flush(&self) -> RepositoryResult<()> {
        let _flushing = self.flush_lock.lock();

        let bytes = {
            let entries = self.entries.read();
            self.dirty.store(false, Ordering::Release);
            self.codec.encode(&entries)
        };
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(e) => {
                self.dirty.store(true, Ordering::Release);
                return Err(self.persistence_error("flush", "Failed to encode snapshot", e));
            }
        };

        if let Err(e) = self.write_snapshot(&bytes) {
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }

        log::debug!(
            "Flushed repository '{}' ({} bytes) to {}",
            self.name,
            bytes.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Flush only when something changed since the last flush.
    pub fn flush_if_dirty(&self) -> RepositoryResult<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    fn write_snapshot(&self, bytes: &[u8]) -> RepositoryResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                self.persistence_error("flush", "Failed to create snapshot directory", e)
            })?;
        }

        let tmp = temp_path(&self.path);
        fs::write(&tmp, bytes)
            .map_err(|e| self.persistence_error("flush", "Failed to write snapshot", e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| self.persistence_error("flush", "Failed to replace snapshot", e))
    }

    fn persistence_error(
        &self,
        operation: &str,
        message: &str,
        cause: impl std::fmt::Display,
    ) -> RepositoryError {
        RepositoryError::persistence_with_context(
            format!("{}: {}", message, cause),
            ErrorContext::new(operation)
                .with_entity(self.name.clone())
                .with_details(self.path.display().to_string()),
        )
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl<K, V> DurableRepository for PersistentRepository<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn restore(&self) -> RepositoryResult<usize> {
        PersistentRepository::restore(self)
    }

    fn flush(&self) -> RepositoryResult<()> {
        PersistentRepository::flush(self)
    }

    fn flush_if_dirty(&self) -> RepositoryResult<bool> {
        PersistentRepository::flush_if_dirty(self)
    }
}

#[cfg(test)]
#[path = "persistent_tests.rs"]
mod persistent_tests;
