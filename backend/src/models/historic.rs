//! Daily tables of raw free-spot counts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::occupancy::ParkingId;

/// Cell value meaning "no sample taken for this lot in this bucket".
pub const NO_SAMPLE: i16 = -1;

/// One calendar day of free-spot counts, one row per parking lot and one
/// column per bucket.
///
/// Dimensions are fixed when the table is created. Rows are addressed by
/// `parking_id - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricDayTable {
    pub date: NaiveDate,
    pub grid: Vec<Vec<i16>>,
}

impl HistoricDayTable {
    /// A table filled with [`NO_SAMPLE`].
    pub fn new(date: NaiveDate, parking_count: usize, bucket_count: usize) -> Self {
        Self {
            date,
            grid: vec![vec![NO_SAMPLE; bucket_count]; parking_count],
        }
    }

    pub fn parking_count(&self) -> usize {
        self.grid.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.grid.first().map(Vec::len).unwrap_or(0)
    }

    /// Free spots recorded for a lot in a bucket, `None` when not sampled or
    /// outside the table.
    pub fn free_spots(&self, parking_id: ParkingId, bucket: usize) -> Option<i16> {
        let row = row_of(parking_id)?;
        self.grid
            .get(row)?
            .get(bucket)
            .copied()
            .filter(|v| *v != NO_SAMPLE)
    }

    /// Overwrite a cell. Returns `false` when the cell lies outside the table.
    pub fn set(&mut self, parking_id: ParkingId, bucket: usize, free_spots: i16) -> bool {
        let Some(row) = row_of(parking_id) else {
            return false;
        };
        match self.grid.get_mut(row).and_then(|r| r.get_mut(bucket)) {
            Some(cell) => {
                *cell = free_spots;
                true
            }
            None => false,
        }
    }
}

fn row_of(parking_id: ParkingId) -> Option<usize> {
    usize::try_from(parking_id).ok()?.checked_sub(1)
}
