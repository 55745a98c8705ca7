//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! service layer. Statistics are computed under short read locks, so no
//! handler needs a blocking task.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::dto::{
    parse_date, parse_day, parse_ids, parse_time, CollectiveDay, CollectiveWeek, DayQuery,
    DayStats, HealthResponse, HistoricDayTable, HistoryQuery, HistoryResponse, IdsQuery,
    PeakTimesResponse, RequestStatsQuery, RequestStatsResponse, StatsResponse, TimeQuery,
    TimeStats, WeekStats,
};
use super::error::AppError;
use super::state::AppState;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

fn stats_response<T>(state: &AppState, results: Vec<T>) -> Json<StatsResponse<T>> {
    Json(StatsResponse::new(
        state.occupancy_stats.bucket_length().into(),
        results,
    ))
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        parkings: state.stores.occupancy.len(),
        history_days: state.stores.historic.len(),
    }))
}

// =============================================================================
// Occupancy Statistics
// =============================================================================

/// GET /v1/stats/time?time=HH:MM[&day=..][&ids=..]
///
/// Availability at a time of day, optionally on a specific day of the week.
pub async fn stats_by_time(
    State(state): State<AppState>,
    Query(query): Query<TimeQuery>,
) -> HandlerResult<StatsResponse<TimeStats>> {
    let time = parse_time(&query.time)?;
    let day = query.day.as_deref().map(parse_day).transpose()?;
    let ids = parse_ids(query.ids.as_deref())?;

    Ok(stats_response(&state, state.occupancy_stats.by_time(time, day, &ids)))
}

/// GET /v1/stats/day?day=..[&ids=..]
pub async fn stats_by_day(
    State(state): State<AppState>,
    Query(query): Query<DayQuery>,
) -> HandlerResult<StatsResponse<DayStats>> {
    let day = parse_day(&query.day)?;
    let ids = parse_ids(query.ids.as_deref())?;

    Ok(stats_response(&state, state.occupancy_stats.by_day(day, &ids)))
}

/// GET /v1/stats/week[?ids=..]
pub async fn stats_by_week(
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> HandlerResult<StatsResponse<WeekStats>> {
    let ids = query.parse()?;
    Ok(stats_response(&state, state.occupancy_stats.by_week(&ids)))
}

/// GET /v1/stats/collective/day?day=..[&ids=..]
///
/// Every bucket of one day, for charting.
pub async fn collective_daily(
    State(state): State<AppState>,
    Query(query): Query<DayQuery>,
) -> HandlerResult<StatsResponse<CollectiveDay>> {
    let day = parse_day(&query.day)?;
    let ids = parse_ids(query.ids.as_deref())?;

    Ok(stats_response(&state, state.occupancy_stats.collective_daily(day, &ids)))
}

/// GET /v1/stats/collective/week[?ids=..]
pub async fn collective_weekly(
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> HandlerResult<StatsResponse<CollectiveWeek>> {
    let ids = query.parse()?;
    Ok(stats_response(&state, state.occupancy_stats.collective_weekly(&ids)))
}

// =============================================================================
// Historic Ledger
// =============================================================================

/// GET /v1/history?from=YYYY-MM-DD[&to=YYYY-MM-DD]
///
/// Daily tables in date order; `to` defaults to today.
pub async fn history_range(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> HandlerResult<HistoryResponse> {
    let from = parse_date(&query.from)?;
    let to = query.to.as_deref().map(parse_date).transpose()?;

    Ok(Json(HistoryResponse {
        from,
        to,
        days: state.stores.historic.range_from(from, to),
    }))
}

/// GET /v1/history/{date}
pub async fn history_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> HandlerResult<HistoricDayTable> {
    let date = parse_date(&date)?;
    state
        .stores
        .historic
        .day_of(date)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No history recorded for {}", date)))
}

// =============================================================================
// Request Statistics
// =============================================================================

/// GET /v1/requests/stats[?endpoint=..]
pub async fn request_stats(
    State(state): State<AppState>,
    Query(query): Query<RequestStatsQuery>,
) -> HandlerResult<RequestStatsResponse> {
    let endpoints = match query.endpoint {
        Some(endpoint) => vec![state
            .request_stats
            .summary(&endpoint)
            .ok_or_else(|| AppError::NotFound(format!("Unknown endpoint '{}'", endpoint)))?],
        None => state.request_stats.summaries(),
    };
    Ok(Json(RequestStatsResponse { endpoints }))
}

/// GET /v1/requests/peak
pub async fn peak_times(State(state): State<AppState>) -> HandlerResult<PeakTimesResponse> {
    Ok(Json(PeakTimesResponse {
        peaks: state.request_stats.peak_times(),
    }))
}
