//! Occupancy store: per-lot availability means by day of week and bucket.

use std::collections::HashSet;
use std::path::PathBuf;

use super::persistent::PersistentRepository;
use crate::db::repository::{DurableRepository, RepositoryResult};
use crate::models::{AvailabilityData, DayOfWeek, OccupancyRecord, ParkingId};

/// Durable store of [`OccupancyRecord`]s keyed by parking id.
pub struct OccupancyStore {
    repo: PersistentRepository<ParkingId, OccupancyRecord>,
}

impl OccupancyStore {
    pub const NAME: &'static str = "occupancy";

    /// Create an empty store snapshotted to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            repo: PersistentRepository::new(Self::NAME, path, |id: &ParkingId| {
                OccupancyRecord::new(*id, 0)
            }),
        }
    }

    /// Fold one availability sample into the `(day, bucket)` mean of a lot.
    ///
    /// The record is created on first sight with `total_spots`; later snapshots
    /// never change the stored capacity.
    pub fn record_snapshot(
        &self,
        parking_id: ParkingId,
        total_spots: i32,
        day: DayOfWeek,
        bucket: usize,
        free_ratio: f64,
    ) -> AvailabilityData {
        self.repo.update_all(|records| {
            records
                .entry(parking_id)
                .or_insert_with(|| OccupancyRecord::new(parking_id, total_spots))
                .record(day, bucket, free_ratio)
        })
    }

    pub fn get(&self, parking_id: ParkingId) -> Option<OccupancyRecord> {
        self.repo.find(&parking_id)
    }

    /// All known records, ascending by id.
    pub fn all(&self) -> Vec<OccupancyRecord> {
        self.repo.read(|records| records.values().cloned().collect())
    }

    /// Records for the requested ids.
    ///
    /// When `ids` is empty, or none of them is known, every record is returned
    /// instead of an empty result. Unknown ids mixed with known ones are
    /// silently dropped.
    pub fn select_many(&self, ids: &HashSet<ParkingId>) -> Vec<OccupancyRecord> {
        self.repo.read(|records| {
            let selected: Vec<OccupancyRecord> = records
                .iter()
                .filter(|(id, _)| ids.contains(*id))
                .map(|(_, record)| record.clone())
                .collect();
            if selected.is_empty() {
                records.values().cloned().collect()
            } else {
                selected
            }
        })
    }

    pub fn ids(&self) -> Vec<ParkingId> {
        self.repo.keys()
    }

    pub fn len(&self) -> usize {
        self.repo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repo.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.repo.is_dirty()
    }
}

impl DurableRepository for OccupancyStore {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn restore(&self) -> RepositoryResult<usize> {
        self.repo.restore()
    }

    fn flush(&self) -> RepositoryResult<()> {
        self.repo.flush()
    }

    fn flush_if_dirty(&self) -> RepositoryResult<bool> {
        self.repo.flush_if_dirty()
    }
}
