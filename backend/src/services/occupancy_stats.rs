//! Availability statistics computed from the occupancy store.
//!
//! The aggregator only reads: every query takes a consistent copy of the
//! selected records and computes over it.
//!
//! Rounding is deliberately asymmetric. `average_availability` is rounded to
//! three decimals half-up, while `average_free_spots` truncates the product of
//! that rounded availability and the lot's capacity.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::db::OccupancyStore;
use crate::models::{
    minute_of_day, round_minute_of_day, scaled_half_up, AvailabilityData, BucketLength, DayOfWeek,
    OccupancyRecord, ParkingId,
};

/// Rounded availability of a lot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityStats {
    pub average_availability: f64,
    pub average_free_spots: i32,
}

impl AvailabilityStats {
    pub fn from_average(average: f64, total_spots: i32) -> Self {
        // Thousandths keep the free-spot truncation exact.
        let thousandths = scaled_half_up(average, 3).unwrap_or(0);
        let free_spots = (thousandths * i64::from(total_spots)).div_euclid(1000);
        Self {
            average_availability: thousandths as f64 / 1000.0,
            average_free_spots: i32::try_from(free_spots).unwrap_or(i32::MAX),
        }
    }
}

/// Availability of a lot at one time of day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeStats {
    pub parking_id: ParkingId,
    pub total_spots: i32,
    /// The queried time rounded to the nearest bucket boundary.
    pub time: NaiveTime,
    pub day: Option<DayOfWeek>,
    #[serde(flatten)]
    pub stats: AvailabilityStats,
}

/// The bucket holding a maximum or minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extreme {
    pub day: DayOfWeek,
    pub start: NaiveTime,
    #[serde(flatten)]
    pub stats: AvailabilityStats,
}

/// Summary of a lot over one day of the week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    pub parking_id: ParkingId,
    pub total_spots: i32,
    pub day: DayOfWeek,
    #[serde(flatten)]
    pub average: AvailabilityStats,
    pub max: Option<Extreme>,
    pub min: Option<Extreme>,
}

/// Summary of a lot over the whole week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekStats {
    pub parking_id: ParkingId,
    pub total_spots: i32,
    #[serde(flatten)]
    pub average: AvailabilityStats,
    pub max: Option<Extreme>,
    pub min: Option<Extreme>,
}

/// Every populated bucket of one day, keyed by bucket start. Used for charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectiveDay {
    pub parking_id: ParkingId,
    pub total_spots: i32,
    pub day: DayOfWeek,
    pub buckets: BTreeMap<NaiveTime, AvailabilityStats>,
}

/// Every populated bucket of the week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectiveWeek {
    pub parking_id: ParkingId,
    pub total_spots: i32,
    pub days: BTreeMap<DayOfWeek, BTreeMap<NaiveTime, AvailabilityStats>>,
}

/// Running mean plus first-reached extremes.
struct Accumulator {
    sum: f64,
    count: usize,
    max: Option<(DayOfWeek, usize, f64)>,
    min: Option<(DayOfWeek, usize, f64)>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            max: None,
            min: None,
        }
    }

    /// Later cells replace an extreme only on strict improvement.
    fn push(&mut self, day: DayOfWeek, bucket: usize, average: f64) {
        self.sum += average;
        self.count += 1;
        if self.max.map_or(true, |(_, _, m)| average > m) {
            self.max = Some((day, bucket, average));
        }
        if self.min.map_or(true, |(_, _, m)| average < m) {
            self.min = Some((day, bucket, average));
        }
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Read-only statistics over an [`OccupancyStore`].
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<OccupancyStore>,
    bucket_length: BucketLength,
}

impl StatsAggregator {
    pub fn new(store: Arc<OccupancyStore>, bucket_length: BucketLength) -> Self {
        Self {
            store,
            bucket_length,
        }
    }

    pub fn bucket_length(&self) -> BucketLength {
        self.bucket_length
    }

    /// Availability at `time`, rounded to the nearest bucket boundary.
    ///
    /// With a `day`, that single cell is read and a missing cell counts as zero.
    /// Without one, the cell is averaged over the days that have it; a lot with
    /// no such day still appears, with zero availability. When rounding crosses
    /// midnight the first bucket of the following day is used.
    pub fn by_time(
        &self,
        time: NaiveTime,
        day: Option<DayOfWeek>,
        ids: &HashSet<ParkingId>,
    ) -> Vec<TimeStats> {
        let (minute, rolled) = round_minute_of_day(minute_of_day(time), self.bucket_length);
        let bucket = (minute / self.bucket_length.minutes()) as usize;
        let day = day.map(|d| if rolled { d.next() } else { d });
        let rounded = self.bucket_length.start_of(bucket);

        self.store
            .select_many(ids)
            .iter()
            .map(|record| {
                let average = match day {
                    Some(day) => record
                        .availability(day, bucket)
                        .unwrap_or_default()
                        .average_availability,
                    None => mean_across_days(record, bucket),
                };
                TimeStats {
                    parking_id: record.parking_id,
                    total_spots: record.total_spots,
                    time: rounded,
                    day,
                    stats: AvailabilityStats::from_average(average, record.total_spots),
                }
            })
            .collect()
    }

    /// Mean, maximum and minimum over the populated buckets of `day`.
    pub fn by_day(&self, day: DayOfWeek, ids: &HashSet<ParkingId>) -> Vec<DayStats> {
        self.store
            .select_many(ids)
            .iter()
            .map(|record| {
                let mut acc = Accumulator::new();
                for (bucket, data) in record.day(day) {
                    acc.push(day, bucket, data.average_availability);
                }
                DayStats {
                    parking_id: record.parking_id,
                    total_spots: record.total_spots,
                    day,
                    average: AvailabilityStats::from_average(acc.mean(), record.total_spots),
                    max: self.extreme(acc.max, record.total_spots),
                    min: self.extreme(acc.min, record.total_spots),
                }
            })
            .collect()
    }

    /// Mean, maximum and minimum over every populated `(day, bucket)` cell,
    /// Monday first.
    pub fn by_week(&self, ids: &HashSet<ParkingId>) -> Vec<WeekStats> {
        self.store
            .select_many(ids)
            .iter()
            .map(|record| {
                let mut acc = Accumulator::new();
                for (day, buckets) in &record.history {
                    for (bucket, data) in buckets {
                        acc.push(*day, *bucket, data.average_availability);
                    }
                }
                WeekStats {
                    parking_id: record.parking_id,
                    total_spots: record.total_spots,
                    average: AvailabilityStats::from_average(acc.mean(), record.total_spots),
                    max: self.extreme(acc.max, record.total_spots),
                    min: self.extreme(acc.min, record.total_spots),
                }
            })
            .collect()
    }

    /// Per-bucket statistics of `day` for every selected lot.
    pub fn collective_daily(&self, day: DayOfWeek, ids: &HashSet<ParkingId>) -> Vec<CollectiveDay> {
        self.store
            .select_many(ids)
            .iter()
            .map(|record| CollectiveDay {
                parking_id: record.parking_id,
                total_spots: record.total_spots,
                day,
                buckets: self.bucket_map(record, day),
            })
            .collect()
    }

    /// Per-day, per-bucket statistics for every selected lot.
    pub fn collective_weekly(&self, ids: &HashSet<ParkingId>) -> Vec<CollectiveWeek> {
        self.store
            .select_many(ids)
            .iter()
            .map(|record| CollectiveWeek {
                parking_id: record.parking_id,
                total_spots: record.total_spots,
                days: record
                    .history
                    .keys()
                    .map(|day| (*day, self.bucket_map(record, *day)))
                    .collect(),
            })
            .collect()
    }

    fn bucket_map(
        &self,
        record: &OccupancyRecord,
        day: DayOfWeek,
    ) -> BTreeMap<NaiveTime, AvailabilityStats> {
        record
            .day(day)
            .map(|(bucket, data)| {
                (
                    self.bucket_length.start_of(bucket),
                    AvailabilityStats::from_average(data.average_availability, record.total_spots),
                )
            })
            .collect()
    }

    fn extreme(&self, cell: Option<(DayOfWeek, usize, f64)>, total_spots: i32) -> Option<Extreme> {
        cell.map(|(day, bucket, average)| Extreme {
            day,
            start: self.bucket_length.start_of(bucket),
            stats: AvailabilityStats::from_average(average, total_spots),
        })
    }
}

/// Mean of one bucket over the days that recorded it; 0 when none did.
fn mean_across_days(record: &OccupancyRecord, bucket: usize) -> f64 {
    let present: Vec<AvailabilityData> = DayOfWeek::ALL
        .iter()
        .filter_map(|day| record.availability(*day, bucket))
        .collect();
    if present.is_empty() {
        return 0.0;
    }
    present.iter().map(|a| a.average_availability).sum::<f64>() / present.len() as f64
}

#[cfg(test)]
#[path = "occupancy_stats_tests.rs"]
mod occupancy_stats_tests;
