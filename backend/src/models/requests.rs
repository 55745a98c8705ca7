//! Request activity types.

use serde::{Deserialize, Serialize};

use super::time::BucketLength;

/// Key of the synthetic record aggregating every endpoint.
pub const TOTAL_ENDPOINT: &str = "total";

/// Request rate for one bucket of the day.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeframeStatistic {
    pub average_number_of_requests: f64,
    /// Live counter, reset each time the bucket is closed.
    pub total_number_of_requests_this_cycle: u64,
    pub completed_cycles: u64,
}

impl TimeframeStatistic {
    /// Blend the live counter into the rolling average and start a new cycle.
    pub fn close_cycle(&self) -> Self {
        let cycles = self.completed_cycles as f64;
        Self {
            average_number_of_requests: (self.average_number_of_requests * cycles
                + self.total_number_of_requests_this_cycle as f64)
                / (cycles + 1.0),
            total_number_of_requests_this_cycle: 0,
            completed_cycles: self.completed_cycles + 1,
        }
    }
}

/// Counters and per-bucket rates of a single endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointData {
    pub request_count: u64,
    pub success_count: u64,
    pub bucket_length_minutes: BucketLength,
    pub buckets: Vec<TimeframeStatistic>,
}

impl EndpointData {
    pub fn new(bucket_length: BucketLength) -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            bucket_length_minutes: bucket_length,
            buckets: vec![TimeframeStatistic::default(); bucket_length.count()],
        }
    }

    /// Count one request in `bucket`.
    pub fn register(&mut self, succeeded: bool, bucket: usize) {
        self.request_count += 1;
        if succeeded {
            self.success_count += 1;
        }
        if let Some(stat) = self.buckets.get_mut(bucket) {
            stat.total_number_of_requests_this_cycle += 1;
        }
    }

    /// `success / requests * 100`, 2 decimals half-up; 0 without requests.
    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            return 0.0;
        }
        round_half_up(
            self.success_count as f64 / self.request_count as f64 * 100.0,
            2,
        )
    }

    /// Whether the bucket layout agrees with `bucket_length`.
    pub fn matches_layout(&self, bucket_length: BucketLength) -> bool {
        self.bucket_length_minutes == bucket_length && self.buckets.len() == bucket_length.count()
    }
}

/// Round to `decimals` places, ties away from zero (half-up for the
/// non-negative values this crate produces).
///
/// Ties are decided on the shortest decimal form of `value`, so `0.5025`
/// rounds to `0.503` even though the nearest `f64` lies just below the tie.
pub fn round_half_up(value: f64, decimals: u32) -> f64 {
    match scaled_half_up(value, decimals) {
        Some(scaled) => scaled as f64 / 10f64.powi(decimals as i32),
        None => value,
    }
}

/// [`round_half_up`] as an exact count of `10^-decimals` units.
///
/// `None` for non-finite values and magnitudes that do not fit an `i64`.
pub fn scaled_half_up(value: f64, decimals: u32) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    // `Display` for f64 never uses exponent notation.
    let digits = value.abs().to_string();
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));

    let mut scaled: i64 = whole.parse().ok()?;
    let mut fraction = fraction.bytes().map(|b| i64::from(b - b'0'));
    for _ in 0..decimals {
        let digit = fraction.next().unwrap_or(0);
        scaled = scaled.checked_mul(10)?.checked_add(digit)?;
    }
    if fraction.next().is_some_and(|digit| digit >= 5) {
        scaled = scaled.checked_add(1)?;
    }
    Some(if value.is_sign_negative() { -scaled } else { scaled })
}
