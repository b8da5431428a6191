use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::metrics::CorrelationId;
use crate::AppState;

use super::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationBody {
    /// `null` clears the current id
    pub correlation_id: Option<CorrelationId>,
}

// ─── POST /api/perf/clear ────────────────────────────────────────

pub async fn clear_perf(State(state): State<Arc<AppState>>) -> StatusCode {
    state.runtime.clear_all();
    tracing::info!("probe statistics cleared");
    StatusCode::NO_CONTENT
}

// ─── GET /api/perf/correlation ───────────────────────────────────

pub async fn get_correlation(State(state): State<Arc<AppState>>) -> Json<CorrelationBody> {
    Json(CorrelationBody {
        correlation_id: state.runtime.current_correlation_id(),
    })
}

// ─── PUT /api/perf/correlation ───────────────────────────────────

pub async fn put_correlation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CorrelationBody>,
) -> Result<Json<CorrelationBody>, AppError> {
    if body
        .correlation_id
        .as_ref()
        .is_some_and(|id| id.as_str().trim().is_empty())
    {
        return Err(AppError::BadRequest("correlation_id must not be blank".into()));
    }

    state.runtime.set_current_correlation_id(body.correlation_id.clone());
    Ok(Json(body))
}
