use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::metrics::stream;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Statistics export ───────────────────────────────────
        .route("/api/perf", get(stream::get_perf))
        .route("/api/perf/stream", get(stream::perf_stream))
        .route("/api/perf/clear", post(handlers::perf::clear_perf))
        // ── Correlation id ──────────────────────────────────────
        .route(
            "/api/perf/correlation",
            get(handlers::perf::get_correlation).put(handlers::perf::put_correlation),
        )
        // ── Demo workload control ───────────────────────────────
        .route(
            "/api/workload/start",
            post(handlers::workload::start_workload),
        )
        .route(
            "/api/workload/stop",
            post(handlers::workload::stop_workload),
        )
        .route(
            "/api/workload/status",
            get(handlers::workload::workload_status),
        )
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            timing::timing_middleware,
        ))
        .layer(CorsLayer::permissive())
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
}
