//! Occupancy history types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::time::DayOfWeek;

/// Identifier of a parking lot as reported by the occupancy source.
pub type ParkingId = i32;

/// Online mean of a free-spots-to-total-spots ratio.
///
/// Values are immutable: every sample produces a new `AvailabilityData` that
/// replaces the previous one, so readers never observe a half-applied update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityData {
    pub sample_count: u64,
    pub average_availability: f64,
}

impl AvailabilityData {
    pub fn new(sample_count: u64, average_availability: f64) -> Self {
        Self {
            sample_count,
            average_availability,
        }
    }

    /// Fold one more ratio into the mean: `(avg * n + ratio) / (n + 1)`.
    pub fn with_sample(&self, ratio: f64) -> Self {
        let n = self.sample_count as f64;
        Self {
            sample_count: self.sample_count + 1,
            average_availability: (self.average_availability * n + ratio) / (n + 1.0),
        }
    }
}

/// Per-lot grid of availability means indexed by day of week and bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyRecord {
    pub parking_id: ParkingId,
    /// Capacity captured on the first snapshot and not re-validated afterwards.
    pub total_spots: i32,
    #[serde(default)]
    pub history: BTreeMap<DayOfWeek, BTreeMap<usize, AvailabilityData>>,
}

impl OccupancyRecord {
    pub fn new(parking_id: ParkingId, total_spots: i32) -> Self {
        Self {
            parking_id,
            total_spots,
            history: BTreeMap::new(),
        }
    }

    /// The entry for one `(day, bucket)` cell, if any sample was recorded.
    pub fn availability(&self, day: DayOfWeek, bucket: usize) -> Option<AvailabilityData> {
        self.history.get(&day)?.get(&bucket).copied()
    }

    /// Populated buckets of a day in ascending order.
    pub fn day(&self, day: DayOfWeek) -> impl Iterator<Item = (usize, AvailabilityData)> + '_ {
        self.history
            .get(&day)
            .into_iter()
            .flat_map(|buckets| buckets.iter().map(|(b, a)| (*b, *a)))
    }

    /// Replace the addressed cell with the mean updated by `ratio`.
    pub fn record(&mut self, day: DayOfWeek, bucket: usize, ratio: f64) -> AvailabilityData {
        let cell = self.history.entry(day).or_default().entry(bucket).or_default();
        *cell = cell.with_sample(ratio);
        *cell
    }
}

/// One observation from the occupancy source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingSnapshot {
    pub parking_id: ParkingId,
    pub total_spots: i32,
    pub free_spots: i32,
}

impl ParkingSnapshot {
    /// `free / total` clamped into `[0, 1]`; `None` when the lot reports no capacity.
    pub fn free_ratio(&self) -> Option<f64> {
        if self.total_spots <= 0 {
            return None;
        }
        Some((self.free_spots as f64 / self.total_spots as f64).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_mean_matches_arithmetic_mean() {
        let ratios = [0.2, 0.9, 0.45, 0.6, 0.05, 1.0];
        let expected = ratios.iter().sum::<f64>() / ratios.len() as f64;

        let forward = ratios
            .iter()
            .fold(AvailabilityData::default(), |acc, r| acc.with_sample(*r));
        let backward = ratios
            .iter()
            .rev()
            .fold(AvailabilityData::default(), |acc, r| acc.with_sample(*r));

        assert_eq!(forward.sample_count, 6);
        assert_eq!(backward.sample_count, 6);
        assert!((forward.average_availability - expected).abs() < 1e-12);
        assert!((backward.average_availability - expected).abs() < 1e-12);
    }

    #[test]
    fn test_record_creates_cells_lazily() {
        let mut record = OccupancyRecord::new(1, 100);
        assert!(record.availability(DayOfWeek::Monday, 2).is_none());

        record.record(DayOfWeek::Monday, 2, 0.8);
        let data = record.record(DayOfWeek::Monday, 2, 0.6);

        assert_eq!(data.sample_count, 2);
        assert!((data.average_availability - 0.7).abs() < 1e-12);
        assert_eq!(record.day(DayOfWeek::Monday).count(), 1);
        assert_eq!(record.day(DayOfWeek::Tuesday).count(), 0);
    }

    #[test]
    fn test_free_ratio() {
        let snap = ParkingSnapshot {
            parking_id: 1,
            total_spots: 200,
            free_spots: 50,
        };
        assert_eq!(snap.free_ratio(), Some(0.25));

        let over = ParkingSnapshot {
            free_spots: 250,
            ..snap
        };
        assert_eq!(over.free_ratio(), Some(1.0));

        let closed = ParkingSnapshot {
            total_spots: 0,
            ..snap
        };
        assert_eq!(closed.free_ratio(), None);
    }
}
