//! Service layer for ingestion and read-side statistics.
//!
//! Services sit between the stores and the callers (scheduler, HTTP handlers).
//! Ingestion is the only writer of occupancy data; the aggregators only read.

pub mod ingestion;
pub mod occupancy_stats;
pub mod request_stats;

pub use ingestion::{IngestionReport, Ingestor, JsonFileSource, OccupancySource};
pub use occupancy_stats::{
    AvailabilityStats, CollectiveDay, CollectiveWeek, DayStats, Extreme, StatsAggregator,
    TimeStats, WeekStats,
};
pub use request_stats::{BucketRate, EndpointSummary, RequestStatsAggregator};
