use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::BeginOptions;
use crate::AppState;

/// Per-request suffix for in-flight keys.
static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

/// Instruments every request as probe `"<METHOD> <route>"` and adds two
/// response headers:
///
///   X-Response-Time-Us  — total handler wall time in microseconds
///   Server-Timing       — same value in the standard Server-Timing format
///
/// A request succeeds when the status is below 500. The matched route
/// template is used when available so `/api/x/1` and `/api/x/2` share a probe.
/// Each request gets its own in-flight key (`"<probe>#<seq>"`), so overlapping
/// requests on one route are timed independently into the same probe.
pub async fn timing_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let probe = format!("{} {}", req.method(), path);

    let key = format!("{probe}#{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed));

    state.runtime.begin_keyed(&key, &probe, BeginOptions::default());
    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let status = response.status();
    // Sink failures are logged by the runtime; the response goes out regardless.
    let _ = state.runtime.end_operation(&key, !status.is_server_error());

    let us = elapsed.as_micros();
    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    // Skip the SSE stream, it stays open
    if !path.ends_with("/stream") {
        tracing::debug!(status = status.as_u16(), %probe, us = us as u64, "request");
    }

    response
}
