//! Request statistics store: per-endpoint counters and rolling request rates.
//!
//! Every request is counted twice, once on its own endpoint and once on the
//! synthetic [`TOTAL_ENDPOINT`] record. A scheduled cycle closes the bucket that
//! just elapsed: regular endpoints blend the bucket's live counter into their
//! rolling average, while the total record has that bucket overwritten with the
//! sum of the endpoints' freshly closed averages.

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::persistent::PersistentRepository;
use crate::db::repository::{DurableRepository, RepositoryResult};
use crate::models::{
    previous_index, BucketLength, EndpointData, TimeframeStatistic, TOTAL_ENDPOINT,
};

/// Number of buckets reported by [`RequestStatsStore::peak_times`].
pub const PEAK_TIMES: usize = 3;

/// A busy bucket of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakTime {
    pub bucket: usize,
    pub start: NaiveTime,
    pub average_number_of_requests: f64,
}

/// Durable store of [`EndpointData`] keyed by endpoint path.
pub struct RequestStatsStore {
    repo: PersistentRepository<String, EndpointData>,
    bucket_length: BucketLength,
}

impl RequestStatsStore {
    pub const NAME: &'static str = "request_stats";

    /// Create a store whose only record is the total.
    pub fn new(path: impl Into<PathBuf>, bucket_length: BucketLength) -> Self {
        let repo = PersistentRepository::new(Self::NAME, path, move |_: &String| {
            EndpointData::new(bucket_length)
        });
        // A store holding only the empty total has nothing worth a snapshot.
        repo.update_all_if_changed(|endpoints| {
            endpoints.insert(TOTAL_ENDPOINT.to_string(), EndpointData::new(bucket_length));
            false
        });
        Self {
            repo,
            bucket_length,
        }
    }

    pub fn bucket_length(&self) -> BucketLength {
        self.bucket_length
    }

    /// Count a completed request on its endpoint and on the total.
    pub fn register_request(&self, endpoint: &str, succeeded: bool, at: NaiveTime) {
        let bucket = self.bucket_length.index_of(at);
        let length = self.bucket_length;
        self.repo.update_all(|endpoints| {
            if endpoint != TOTAL_ENDPOINT {
                endpoints
                    .entry(endpoint.to_string())
                    .or_insert_with(|| EndpointData::new(length))
                    .register(succeeded, bucket);
            }
            endpoints
                .entry(TOTAL_ENDPOINT.to_string())
                .or_insert_with(|| EndpointData::new(length))
                .register(succeeded, bucket);
        });
    }

    /// Close the bucket preceding the one containing `now`.
    ///
    /// # Returns
    /// The index of the closed bucket.
    pub fn recalculate_cycle(&self, now: NaiveTime) -> usize {
        let count = self.bucket_length.count();
        let bucket = previous_index(self.bucket_length.index_of(now), count);

        let total_average = self.repo.update_all(|endpoints| {
            let mut sum = 0.0;
            for (key, data) in endpoints.iter_mut() {
                if key == TOTAL_ENDPOINT {
                    continue;
                }
                if let Some(stat) = data.buckets.get_mut(bucket) {
                    *stat = stat.close_cycle();
                    sum += stat.average_number_of_requests;
                }
            }

            let total = endpoints
                .entry(TOTAL_ENDPOINT.to_string())
                .or_insert_with(|| EndpointData::new(self.bucket_length));
            if let Some(stat) = total.buckets.get_mut(bucket) {
                *stat = TimeframeStatistic {
                    average_number_of_requests: sum,
                    total_number_of_requests_this_cycle: 0,
                    completed_cycles: stat.completed_cycles + 1,
                };
            }
            sum
        });

        log::debug!(
            "Closed request bucket {} ({}), total average now {:.3}",
            bucket,
            self.bucket_length.start_of(bucket),
            total_average
        );
        bucket
    }

    /// Success percentage of an endpoint, 0 when unknown or unused.
    pub fn success_rate(&self, endpoint: &str) -> f64 {
        self.repo
            .read(|endpoints| endpoints.get(endpoint).map(EndpointData::success_rate))
            .unwrap_or(0.0)
    }

    /// The busiest buckets of the total record, highest average first.
    ///
    /// Equal averages keep bucket order.
    pub fn peak_times(&self) -> Vec<PeakTime> {
        let total = self.repo.get(&TOTAL_ENDPOINT.to_string());
        let mut peaks: Vec<PeakTime> = total
            .buckets
            .iter()
            .enumerate()
            .map(|(bucket, stat)| PeakTime {
                bucket,
                start: total.bucket_length_minutes.start_of(bucket),
                average_number_of_requests: stat.average_number_of_requests,
            })
            .collect();
        peaks.sort_by(|a, b| {
            b.average_number_of_requests
                .partial_cmp(&a.average_number_of_requests)
                .unwrap_or(Ordering::Equal)
        });
        peaks.truncate(PEAK_TIMES);
        peaks
    }

    pub fn endpoint(&self, endpoint: &str) -> Option<EndpointData> {
        self.repo.read(|endpoints| endpoints.get(endpoint).cloned())
    }

    /// Every record including the total, ascending by key.
    pub fn endpoints(&self) -> Vec<(String, EndpointData)> {
        self.repo.entries()
    }

    pub fn is_dirty(&self) -> bool {
        self.repo.is_dirty()
    }

    /// Bring restored records in line with the configured layout.
    ///
    /// Marks the store dirty only when a record is reset or the total had to
    /// be created, so an unchanged snapshot is not rewritten.
    fn normalize(&self) {
        let length = self.bucket_length;
        self.repo.update_all_if_changed(|endpoints| {
            let mut changed = false;
            for (key, data) in endpoints.iter_mut() {
                if !data.matches_layout(length) {
                    log::warn!(
                        "Endpoint '{}' was recorded with {} buckets, resetting to {}",
                        key,
                        data.bucket_length_minutes,
                        length
                    );
                    *data = EndpointData {
                        request_count: data.request_count,
                        success_count: data.success_count,
                        ..EndpointData::new(length)
                    };
                    changed = true;
                }
            }
            if !endpoints.contains_key(TOTAL_ENDPOINT) {
                endpoints.insert(TOTAL_ENDPOINT.to_string(), EndpointData::new(length));
                changed = true;
            }
            changed
        });
    }
}

impl DurableRepository for RequestStatsStore {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn restore(&self) -> RepositoryResult<usize> {
        let restored = self.repo.restore()?;
        self.normalize();
        Ok(restored)
    }

    fn flush(&self) -> RepositoryResult<()> {
        self.repo.flush()
    }

    fn flush_if_dirty(&self) -> RepositoryResult<bool> {
        self.repo.flush_if_dirty()
    }
}

#[cfg(test)]
#[path = "requests_tests.rs"]
mod requests_tests;
