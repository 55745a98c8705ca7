//! Repository traits shared by every durable store.
//!
//! The occupancy store, the request statistics store and the historic ledger are
//! all backed by a [`PersistentRepository`](crate::db::repositories::PersistentRepository).
//! [`DurableRepository`] is the object-safe seam the scheduler and the shutdown
//! path use to restore and flush them without knowing their key/value types.

pub mod error;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

/// A store whose in-memory state is snapshotted to durable storage.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`: flushes run on a background task
/// while ingestion and queries keep using the same instance.
pub trait DurableRepository: Send + Sync {
    /// Short name used in logs and error contexts.
    fn name(&self) -> &str;

    /// Load the backing snapshot, replacing the in-memory state.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of entries restored (0 when no snapshot exists)
    /// * `Err(RepositoryError)` - If the snapshot exists but cannot be read or parsed
    fn restore(&self) -> RepositoryResult<usize>;

    /// Serialize the entire current state to the backing snapshot.
    fn flush(&self) -> RepositoryResult<()>;

    /// Flush only when a write happened since the last flush.
    ///
    /// # Returns
    /// * `Ok(true)` - A snapshot was written
    /// * `Ok(false)` - Nothing changed, nothing written
    fn flush_if_dirty(&self) -> RepositoryResult<bool>;
}

/// Flush every repository, continuing past failures.
///
/// A failing repository never prevents the others from being written; every
/// failure is logged and returned together with the name of its repository.
pub fn flush_all(repositories: &[&dyn DurableRepository]) -> Vec<(String, RepositoryError)> {
    let mut failures = Vec::new();
    for repo in repositories {
        match repo.flush() {
            Ok(()) => log::debug!("Flushed repository '{}'", repo.name()),
            Err(e) => {
                log::error!("Failed to flush repository '{}': {}", repo.name(), e);
                failures.push((repo.name().to_string(), e));
            }
        }
    }
    failures
}
