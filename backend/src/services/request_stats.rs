//! Read-side views over the request statistics store.

use std::sync::Arc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::db::{PeakTime, RequestStatsStore};
use crate::models::{round_half_up, EndpointData, TOTAL_ENDPOINT};

/// Average request rate of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRate {
    pub start: NaiveTime,
    pub average_number_of_requests: f64,
    pub completed_cycles: u64,
}

/// Counters, success rate and per-bucket rates of one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub endpoint: String,
    pub request_count: u64,
    pub success_count: u64,
    pub success_rate: f64,
    pub bucket_length_minutes: i64,
    pub buckets: Vec<BucketRate>,
}

impl EndpointSummary {
    fn from_data(endpoint: String, data: &EndpointData) -> Self {
        let length = data.bucket_length_minutes;
        Self {
            endpoint,
            request_count: data.request_count,
            success_count: data.success_count,
            success_rate: data.success_rate(),
            bucket_length_minutes: length.into(),
            buckets: data
                .buckets
                .iter()
                .enumerate()
                .map(|(bucket, stat)| BucketRate {
                    start: length.start_of(bucket),
                    average_number_of_requests: round_half_up(stat.average_number_of_requests, 3),
                    completed_cycles: stat.completed_cycles,
                })
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct RequestStatsAggregator {
    store: Arc<RequestStatsStore>,
}

impl RequestStatsAggregator {
    pub fn new(store: Arc<RequestStatsStore>) -> Self {
        Self { store }
    }

    /// Every endpoint, the total first and the rest by path.
    pub fn summaries(&self) -> Vec<EndpointSummary> {
        let mut summaries: Vec<EndpointSummary> = self
            .store
            .endpoints()
            .into_iter()
            .map(|(key, data)| EndpointSummary::from_data(key, &data))
            .collect();
        summaries.sort_by_key(|s| s.endpoint != TOTAL_ENDPOINT);
        summaries
    }

    pub fn summary(&self, endpoint: &str) -> Option<EndpointSummary> {
        self.store
            .endpoint(endpoint)
            .map(|data| EndpointSummary::from_data(endpoint.to_string(), &data))
    }

    pub fn success_rate(&self, endpoint: &str) -> f64 {
        self.store.success_rate(endpoint)
    }

    pub fn peak_times(&self) -> Vec<PeakTime> {
        self.store.peak_times()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BucketLength;
    use tempfile::TempDir;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn setup() -> (TempDir, Arc<RequestStatsStore>, RequestStatsAggregator) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RequestStatsStore::new(
            dir.path().join("request_stats.json"),
            BucketLength::new(60).unwrap(),
        ));
        let aggregator = RequestStatsAggregator::new(store.clone());
        (dir, store, aggregator)
    }

    #[test]
    fn test_summaries_put_total_first() {
        let (_dir, store, aggregator) = setup();
        store.register_request("/v1/stats/week", true, t(9, 0));
        store.register_request("/health", false, t(9, 30));

        let keys: Vec<String> = aggregator
            .summaries()
            .into_iter()
            .map(|s| s.endpoint)
            .collect();
        assert_eq!(keys, vec!["total", "/health", "/v1/stats/week"]);
    }

    #[test]
    fn test_summary_reports_closed_rates() {
        let (_dir, store, aggregator) = setup();
        for _ in 0..3 {
            store.register_request("/health", true, t(9, 10));
        }
        store.register_request("/health", false, t(9, 20));
        store.recalculate_cycle(t(10, 5));

        let summary = aggregator.summary("/health").unwrap();
        assert_eq!(summary.request_count, 4);
        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.success_rate, 75.0);
        assert_eq!(summary.bucket_length_minutes, 60);
        assert_eq!(summary.buckets.len(), 24);
        assert_eq!(summary.buckets[9].start, t(9, 0));
        assert_eq!(summary.buckets[9].average_number_of_requests, 4.0);
        assert_eq!(summary.buckets[9].completed_cycles, 1);
        assert!(aggregator.summary("/missing").is_none());
        assert_eq!(aggregator.success_rate("/missing"), 0.0);
    }

    #[test]
    fn test_peak_times_follow_total() {
        let (_dir, store, aggregator) = setup();
        store.register_request("/a", true, t(14, 0));
        store.register_request("/a", true, t(14, 1));
        store.register_request("/b", true, t(8, 0));
        store.recalculate_cycle(t(15, 0));
        store.recalculate_cycle(t(9, 0));

        let peaks = aggregator.peak_times();
        assert_eq!(peaks.len(), 3);
        assert_eq!(peaks[0].start, t(14, 0));
        assert_eq!(peaks[0].average_number_of_requests, 2.0);
        assert_eq!(peaks[1].start, t(8, 0));
        assert_eq!(peaks[2].bucket, 0);
    }
}
