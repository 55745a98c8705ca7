//! Store factory for dependency injection.
//!
//! Builds the three durable stores from an [`AppConfig`] and restores them from
//! their snapshots in one step, so callers get either a fully loaded
//! [`StoreSet`] or the first fatal error.

use std::path::Path;
use std::sync::Arc;

use super::repositories::{HistoricLedger, OccupancyStore, RequestStatsStore};
use super::repository::{flush_all, DurableRepository, RepositoryError, RepositoryResult};
use crate::config::AppConfig;
use crate::models::BucketLength;

/// The stores shared by ingestion, scheduled jobs and queries.
#[derive(Clone)]
pub struct StoreSet {
    pub occupancy: Arc<OccupancyStore>,
    pub requests: Arc<RequestStatsStore>,
    pub historic: Arc<HistoricLedger>,
}

impl StoreSet {
    /// Bucket layout shared by the occupancy store and the historic ledger.
    pub fn occupancy_bucket_length(&self) -> BucketLength {
        self.historic.bucket_length()
    }

    /// Every store as a flushable repository.
    pub fn repositories(&self) -> [&dyn DurableRepository; 3] {
        [
            &*self.occupancy as &dyn DurableRepository,
            &*self.requests as &dyn DurableRepository,
            &*self.historic as &dyn DurableRepository,
        ]
    }

    /// Restore every store from its snapshot.
    ///
    /// Stops at the first failure: the service must not start on partial state.
    pub fn restore_all(&self) -> RepositoryResult<()> {
        for repo in self.repositories() {
            let restored = repo.restore()?;
            log::info!("Repository '{}' ready with {} entries", repo.name(), restored);
        }
        Ok(())
    }

    /// Flush every store, continuing past individual failures.
    pub fn flush_all(&self) -> Vec<(String, RepositoryError)> {
        flush_all(&self.repositories())
    }

    /// Flush the stores that changed since their last flush.
    pub fn flush_dirty(&self) -> Vec<(String, RepositoryError)> {
        let mut failures = Vec::new();
        for repo in self.repositories() {
            match repo.flush_if_dirty() {
                Ok(true) => log::debug!("Flushed repository '{}'", repo.name()),
                Ok(false) => {}
                Err(e) => {
                    log::error!("Failed to flush repository '{}': {}", repo.name(), e);
                    failures.push((repo.name().to_string(), e));
                }
            }
        }
        failures
    }
}

/// Factory for creating store instances.
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create empty stores laid out according to `config`.
    ///
    /// # Returns
    /// * `Ok(StoreSet)` - Stores, not yet restored
    /// * `Err(RepositoryError)` - If a bucket length is invalid
    pub fn create(config: &AppConfig) -> RepositoryResult<StoreSet> {
        Ok(Self::create_at(
            config.occupancy_path(),
            config.request_stats_path(),
            config.historic_path(),
            config.occupancy_bucket_length()?,
            config.request_bucket_length()?,
        ))
    }

    /// Create stores and restore them from disk.
    pub fn open(config: &AppConfig) -> RepositoryResult<StoreSet> {
        let stores = Self::create(config)?;
        stores.restore_all()?;
        Ok(stores)
    }

    /// Create empty stores with every snapshot under `dir`, using default file names.
    pub fn create_in_dir(
        dir: impl AsRef<Path>,
        occupancy_length: BucketLength,
        request_length: BucketLength,
    ) -> StoreSet {
        let dir = dir.as_ref();
        Self::create_at(
            dir.join("occupancy.json"),
            dir.join("request_stats.json"),
            dir.join("historic.json"),
            occupancy_length,
            request_length,
        )
    }

    fn create_at(
        occupancy_path: impl AsRef<Path>,
        request_stats_path: impl AsRef<Path>,
        historic_path: impl AsRef<Path>,
        occupancy_length: BucketLength,
        request_length: BucketLength,
    ) -> StoreSet {
        StoreSet {
            occupancy: Arc::new(OccupancyStore::new(occupancy_path.as_ref())),
            requests: Arc::new(RequestStatsStore::new(
                request_stats_path.as_ref(),
                request_length,
            )),
            historic: Arc::new(HistoricLedger::new(historic_path.as_ref(), occupancy_length)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayOfWeek;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn test_open_fresh_directory() {
        let dir = TempDir::new().unwrap();
        let stores = RepositoryFactory::open(&config_in(&dir)).unwrap();
        assert!(stores.occupancy.is_empty());
        assert!(stores.historic.is_empty());
        assert_eq!(stores.requests.endpoints().len(), 1);
    }

    #[test]
    fn test_open_rejects_bad_bucket_length() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.buckets.request_minutes = 0;
        let err = RepositoryFactory::open(&config).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_open_fails_on_corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("historic.json"), b"[1, 2").unwrap();
        let err = RepositoryFactory::open(&config_in(&dir)).err().unwrap();
        assert!(err.is_persistence());
    }

    #[test]
    fn test_one_failing_store_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let length = BucketLength::new(15).unwrap();
        let stores = RepositoryFactory::create_at(
            dir.path().join("occupancy.json"),
            blocker.join("request_stats.json"),
            dir.path().join("historic.json"),
            length,
            length,
        );
        stores
            .occupancy
            .record_snapshot(1, 10, DayOfWeek::Monday, 0, 0.5);

        let failures = stores.flush_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, RequestStatsStore::NAME);
        assert!(dir.path().join("occupancy.json").exists());
        assert!(dir.path().join("historic.json").exists());
    }

    #[test]
    fn test_flush_dirty_only_writes_changed_stores() {
        let dir = TempDir::new().unwrap();
        let length = BucketLength::new(60).unwrap();
        let stores = RepositoryFactory::create_in_dir(dir.path(), length, length);
        stores.restore_all().unwrap();
        assert!(stores.flush_dirty().is_empty());

        stores
            .occupancy
            .record_snapshot(3, 10, DayOfWeek::Friday, 4, 0.2);
        assert!(stores.flush_dirty().is_empty());
        assert!(dir.path().join("occupancy.json").exists());
        assert!(!dir.path().join("historic.json").exists());
    }
}
