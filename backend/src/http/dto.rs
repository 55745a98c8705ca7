//! Data Transfer Objects for the HTTP API.
//!
//! Statistics payloads are the service types themselves; this module adds the
//! query strings, the response envelopes and the parsing of query values.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::error::AppError;
use crate::db::PeakTime;
pub use crate::models::HistoricDayTable;
use crate::models::{DayOfWeek, ParkingId};
pub use crate::services::{
    CollectiveDay, CollectiveWeek, DayStats, EndpointSummary, TimeStats, WeekStats,
};

/// `?ids=1,2,3`. Absent or empty selects every lot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdsQuery {
    #[serde(default)]
    pub ids: Option<String>,
}

impl IdsQuery {
    pub fn parse(&self) -> Result<HashSet<ParkingId>, AppError> {
        parse_ids(self.ids.as_deref())
    }
}

/// GET /v1/stats/time
#[derive(Debug, Clone, Deserialize)]
pub struct TimeQuery {
    /// `HH:MM` or `HH:MM:SS`
    pub time: String,
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub ids: Option<String>,
}

/// GET /v1/stats/day and /v1/stats/collective/day
#[derive(Debug, Clone, Deserialize)]
pub struct DayQuery {
    pub day: String,
    #[serde(default)]
    pub ids: Option<String>,
}

/// GET /v1/history
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
}

/// GET /v1/requests/stats
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestStatsQuery {
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub parkings: usize,
    pub history_days: usize,
}

/// Per-lot statistics with the bucket layout they were computed on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse<T> {
    pub bucket_length_minutes: i64,
    pub total: usize,
    pub results: Vec<T>,
}

impl<T> StatsResponse<T> {
    pub fn new(bucket_length_minutes: i64, results: Vec<T>) -> Self {
        Self {
            bucket_length_minutes,
            total: results.len(),
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
    pub days: Vec<HistoricDayTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatsResponse {
    pub endpoints: Vec<EndpointSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakTimesResponse {
    pub peaks: Vec<PeakTime>,
}

// =============================================================================
// Query value parsing
// =============================================================================

pub fn parse_ids(raw: Option<&str>) -> Result<HashSet<ParkingId>, AppError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ParkingId>()
                .map_err(|_| AppError::BadRequest(format!("Invalid parking id '{}'", s)))
        })
        .collect()
}

pub fn parse_day(raw: &str) -> Result<DayOfWeek, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid day of week '{}'", raw)))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppError::BadRequest(format!("Invalid time '{}', expected HH:MM", raw)))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}
