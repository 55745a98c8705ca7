//! Application state for the HTTP server.

use crate::db::StoreSet;
use crate::services::{RequestStatsAggregator, StatsAggregator};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Stores, for request tracking and historic lookups
    pub stores: StoreSet,
    pub occupancy_stats: StatsAggregator,
    pub request_stats: RequestStatsAggregator,
}

impl AppState {
    /// Create a new application state over the given stores.
    pub fn new(stores: StoreSet) -> Self {
        let occupancy_stats =
            StatsAggregator::new(stores.occupancy.clone(), stores.occupancy_bucket_length());
        let request_stats = RequestStatsAggregator::new(stores.requests.clone());
        Self {
            stores,
            occupancy_stats,
            request_stats,
        }
    }
}
