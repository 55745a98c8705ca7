//! Occupancy ingestion: pull the current snapshot of every lot and fold it
//! into the occupancy store and the historic ledger.
//!
//! ```text
//! OccupancySource::fetch ──► Ingestor::ingest_at
//!                                 ├─► OccupancyStore::record_snapshot  (day of week, bucket)
//!                                 └─► HistoricLedger::record_snapshot  (calendar date, bucket)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::db::{HistoricLedger, OccupancyStore, StoreSet};
use crate::models::{BucketLength, DayOfWeek, ParkingSnapshot};

/// Provider of the current occupancy of every lot.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` so the scheduler can poll them from a
/// spawned task.
#[async_trait]
pub trait OccupancySource: Send + Sync {
    /// Fetch the latest snapshot of every lot.
    async fn fetch(&self) -> Result<Vec<ParkingSnapshot>>;
}

/// Reads a JSON array of snapshots from a file, re-read on every fetch.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OccupancySource for JsonFileSource {
    async fn fetch(&self) -> Result<Vec<ParkingSnapshot>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot file {}", self.path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse snapshot file {}", self.path.display()))
    }
}

/// Outcome of one ingestion pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    pub date: NaiveDate,
    pub day: DayOfWeek,
    pub bucket: usize,
    /// Lots folded into the occupancy store.
    pub recorded: usize,
    /// Lots ignored because they reported no capacity.
    pub skipped: usize,
    /// Lots the historic ledger could not place in the day's table.
    pub historic_rejected: usize,
}

/// Writes snapshots into the occupancy store and the historic ledger.
#[derive(Clone)]
pub struct Ingestor {
    occupancy: Arc<OccupancyStore>,
    historic: Arc<HistoricLedger>,
    bucket_length: BucketLength,
}

impl Ingestor {
    pub fn new(
        occupancy: Arc<OccupancyStore>,
        historic: Arc<HistoricLedger>,
        bucket_length: BucketLength,
    ) -> Self {
        Self {
            occupancy,
            historic,
            bucket_length,
        }
    }

    /// Build an ingestor over the occupancy and historic stores of `stores`.
    pub fn from_stores(stores: &StoreSet) -> Self {
        Self::new(
            stores.occupancy.clone(),
            stores.historic.clone(),
            stores.occupancy_bucket_length(),
        )
    }

    /// Fetch from `source` and ingest at the current local time.
    pub async fn ingest(&self, source: &dyn OccupancySource) -> Result<IngestionReport> {
        let snapshots = source.fetch().await?;
        Ok(self.ingest_at(Local::now().naive_local(), &snapshots))
    }

    /// Ingest `snapshots` as observed at `now`.
    ///
    /// Lots reporting `total_spots <= 0` are skipped. A lot the historic ledger
    /// rejects is still recorded in the occupancy store.
    pub fn ingest_at(&self, now: NaiveDateTime, snapshots: &[ParkingSnapshot]) -> IngestionReport {
        let date = now.date();
        let day = DayOfWeek::of(&date);
        let bucket = self.bucket_length.index_of(now.time());
        // Ids are dense from 1, so the largest id sizes the day's table.
        let parking_count = snapshots
            .iter()
            .map(|s| s.parking_id.max(0) as usize)
            .max()
            .unwrap_or(0)
            .max(snapshots.len());

        let mut report = IngestionReport {
            date,
            day,
            bucket,
            recorded: 0,
            skipped: 0,
            historic_rejected: 0,
        };

        for snapshot in snapshots {
            let Some(ratio) = snapshot.free_ratio() else {
                log::warn!(
                    "Skipping parking {}: reported {} total spots",
                    snapshot.parking_id,
                    snapshot.total_spots
                );
                report.skipped += 1;
                continue;
            };

            self.occupancy
                .record_snapshot(snapshot.parking_id, snapshot.total_spots, day, bucket, ratio);
            report.recorded += 1;

            if let Err(e) = self.historic.record_snapshot(
                date,
                parking_count,
                snapshot.parking_id,
                bucket,
                snapshot.free_spots,
            ) {
                log::warn!("Historic ledger rejected snapshot: {}", e);
                report.historic_rejected += 1;
            }
        }

        log::info!(
            "Ingested {} lots for {} {} bucket {} ({} skipped)",
            report.recorded,
            day,
            date,
            bucket,
            report.skipped
        );
        report
    }
}
