pub mod perf;
pub mod workload;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    AlreadyRunning,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::AlreadyRunning => {
                (StatusCode::CONFLICT, "Workload already running".into())
            }
        };

        let body = serde_json::json!({
            "error":  message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
