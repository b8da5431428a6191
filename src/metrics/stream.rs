use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::registry::FlatStats;
use crate::AppState;

// ─── GET /api/perf ───────────────────────────────────────────────
/// Returns a single JSON snapshot — useful for curl / debugging.

pub async fn get_perf(State(state): State<Arc<AppState>>) -> Json<Vec<FlatStats>> {
    Json(state.runtime.snapshot())
}

// ─── GET /api/perf/stream ────────────────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes the full probe table as JSON every `stream_interval_ms`.

pub async fn perf_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(Duration::from_millis(state.stream_interval_ms));

    let stream = IntervalStream::new(interval).map(move |_| {
        let snapshot = state.runtime.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap_or_default();
        Ok(Event::default().event("snapshot").data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
