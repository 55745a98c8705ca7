//! Historic ledger: one append-only table of raw free-spot counts per calendar day.

use std::path::PathBuf;

use chrono::{Local, NaiveDate};

use super::persistent::PersistentRepository;
use crate::db::repository::{DurableRepository, ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{BucketLength, HistoricDayTable, ParkingId};

/// Durable, date-ordered collection of [`HistoricDayTable`]s.
pub struct HistoricLedger {
    repo: PersistentRepository<NaiveDate, HistoricDayTable>,
    bucket_length: BucketLength,
}

impl HistoricLedger {
    pub const NAME: &'static str = "historic";

    pub fn new(path: impl Into<PathBuf>, bucket_length: BucketLength) -> Self {
        Self {
            repo: PersistentRepository::new(Self::NAME, path, move |date: &NaiveDate| {
                HistoricDayTable::new(*date, 0, bucket_length.count())
            }),
            bucket_length,
        }
    }

    pub fn bucket_length(&self) -> BucketLength {
        self.bucket_length
    }

    /// Store the free-spot count of one lot in one bucket of `date`.
    ///
    /// The day's table is created on first use with `parking_count` rows and the
    /// configured number of buckets, every cell set to the no-sample sentinel.
    /// Writing the same cell twice keeps the last value.
    ///
    /// # Errors
    /// `ValidationError` when the lot or bucket falls outside the day's table.
    pub fn record_snapshot(
        &self,
        date: NaiveDate,
        parking_count: usize,
        parking_id: ParkingId,
        bucket: usize,
        free_spots: i32,
    ) -> RepositoryResult<()> {
        let bucket_count = self.bucket_length.count();
        let value = free_spots.clamp(0, i16::MAX as i32) as i16;

        let stored = self.repo.update_all(|tables| {
            tables
                .entry(date)
                .or_insert_with(|| {
                    log::info!(
                        "Opening historic table for {} ({} lots x {} buckets)",
                        date,
                        parking_count,
                        bucket_count
                    );
                    HistoricDayTable::new(date, parking_count, bucket_count)
                })
                .set(parking_id, bucket, value)
        });

        if stored {
            Ok(())
        } else {
            Err(RepositoryError::validation_with_context(
                format!(
                    "parking {} bucket {} is outside the table for {}",
                    parking_id, bucket, date
                ),
                ErrorContext::new("record_snapshot")
                    .with_entity(Self::NAME)
                    .with_entity_id(parking_id),
            ))
        }
    }

    /// The table for `date`, absent when nothing was recorded that day.
    pub fn day_of(&self, date: NaiveDate) -> Option<HistoricDayTable> {
        self.repo.find(&date)
    }

    /// Tables from `from` through `to` (today when omitted), both inclusive, by date.
    pub fn range_from(&self, from: NaiveDate, to: Option<NaiveDate>) -> Vec<HistoricDayTable> {
        let to = to.unwrap_or_else(|| Local::now().date_naive());
        self.repo
            .range(from..=to)
            .into_iter()
            .map(|(_, table)| table)
            .collect()
    }

    /// Dates with a table, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.repo.keys()
    }

    pub fn len(&self) -> usize {
        self.repo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repo.is_empty()
    }
}

impl DurableRepository for HistoricLedger {
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
