//! Time-of-day bucketing.
//!
//! A day is split into fixed-width buckets of `length` minutes. The bucket count is
//! `ceil(1440 / length)`, so when 1440 is not a multiple of the length the last
//! bucket of the day is shorter than the others.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};

/// Minutes in a day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// A validated, strictly positive bucket length in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct BucketLength(u32);

impl BucketLength {
    /// Create a bucket length, rejecting non-positive values.
    pub fn new(minutes: i64) -> RepositoryResult<Self> {
        if minutes <= 0 {
            return Err(RepositoryError::configuration_with_context(
                format!("bucket length must be positive, got {} minutes", minutes),
                ErrorContext::new("bucket_length").with_entity_id(minutes),
            ));
        }
        // Anything longer than a day is a single bucket.
        let minutes = u32::try_from(minutes).unwrap_or(u32::MAX);
        Ok(Self(minutes))
    }

    /// Length in minutes.
    pub fn minutes(&self) -> u32 {
        self.0
    }

    /// Number of buckets in a day.
    pub fn count(&self) -> usize {
        MINUTES_PER_DAY.div_ceil(self.0) as usize
    }

    /// Bucket index for a time of day.
    pub fn index_of(&self, time: NaiveTime) -> usize {
        (minute_of_day(time) / self.0) as usize
    }

    /// Start time of a bucket.
    ///
    /// Indices past the end of the day clamp to the last minute of the day.
    pub fn start_of(&self, bucket: usize) -> NaiveTime {
        let minutes = (bucket as u64 * self.0 as u64).min(MINUTES_PER_DAY as u64 - 1) as u32;
        NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl TryFrom<i64> for BucketLength {
    type Error = RepositoryError;

    fn try_from(minutes: i64) -> Result<Self, Self::Error> {
        Self::new(minutes)
    }
}

impl From<BucketLength> for i64 {
    fn from(length: BucketLength) -> Self {
        length.0 as i64
    }
}

impl fmt::Display for BucketLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}min", self.0)
    }
}

/// Number of buckets per day for a length given in minutes.
///
/// # Errors
/// `ConfigurationError` when `length_minutes <= 0`.
pub fn bucket_count(length_minutes: i64) -> RepositoryResult<usize> {
    Ok(BucketLength::new(length_minutes)?.count())
}

/// Bucket index of `time`: `floor(minutes_since_midnight / length)`.
pub fn index_of(time: NaiveTime, length: BucketLength) -> usize {
    length.index_of(time)
}

/// The bucket before `current`, wrapping from 0 to the last bucket of the day.
pub fn previous_index(current: usize, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    (current % count + count - 1) % count
}

/// Start time of a bucket.
pub fn bucket_start(bucket: usize, length: BucketLength) -> NaiveTime {
    length.start_of(bucket)
}

/// Round a minute of the day to the nearest multiple of `length`, ties up.
///
/// Returns the rounded minute (always `< 1440`) and whether rounding crossed
/// midnight, in which case the minute is 0 of the following day.
pub fn round_minute_of_day(minute: u32, length: BucketLength) -> (u32, bool) {
    let len = length.minutes();
    let remainder = minute % len;
    let rounded = if remainder * 2 >= len {
        minute - remainder + len
    } else {
        minute - remainder
    };
    if rounded >= MINUTES_PER_DAY {
        (0, true)
    } else {
        (rounded, false)
    }
}

/// Round a timestamp to the nearest bucket boundary, ties up.
///
/// Seconds are ignored. Rounding past the last boundary of the day rolls over to
/// the start of the next day.
pub fn round_to_nearest_boundary(date_time: NaiveDateTime, length: BucketLength) -> NaiveDateTime {
    let (minute, rolled) = round_minute_of_day(minute_of_day(date_time.time()), length);
    let date = if rolled {
        date_time.date() + Duration::days(1)
    } else {
        date_time.date()
    };
    date.and_time(minute_to_time(minute))
}

/// Minutes elapsed since midnight, seconds truncated.
pub fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn minute_to_time(minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap_or(NaiveTime::MIN)
}

/// Day of the week, ordered Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// All days, Monday first.
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Day of a calendar timestamp.
    pub fn of<D: Datelike>(date: &D) -> Self {
        date.weekday().into()
    }

    /// The following day, Sunday wrapping to Monday.
    pub fn next(self) -> Self {
        Self::ALL[(self as usize + 1) % 7]
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        Self::ALL[day.num_days_from_monday() as usize]
    }
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    /// Accepts full English names and chrono's short forms, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<Weekday>()
            .map(Into::into)
            .map_err(|_| format!("Unknown day of week: {}", s))
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod time_tests;
