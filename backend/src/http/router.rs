//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (request tracking, CORS,
//! compression, tracing), and creates the axum router ready for serving.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use chrono::Local;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Occupancy statistics
        .route("/stats/time", get(handlers::stats_by_time))
        .route("/stats/day", get(handlers::stats_by_day))
        .route("/stats/week", get(handlers::stats_by_week))
        .route("/stats/collective/day", get(handlers::collective_daily))
        .route("/stats/collective/week", get(handlers::collective_weekly))
        // Historic ledger
        .route("/history", get(handlers::history_range))
        .route("/history/{date}", get(handlers::history_day))
        // Request statistics
        .route("/requests/stats", get(handlers::request_stats))
        .route("/requests/peak", get(handlers::peak_times));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        // Route layer: only requests that matched a route are counted.
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Count every completed request on its route template, e.g. `/v1/history/{date}`.
///
/// A request succeeds when the response status is 2xx.
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    state.stores.requests.register_request(
        &endpoint,
        response.status().is_success(),
        Local::now().time(),
    );
    response
}
