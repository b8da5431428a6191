use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::AppState;

use super::AppError;

const MAX_CONCURRENCY: u32 = 64;
const MAX_DURATION_SECS: u64 = 300;

// ─── Request / response types ────────────────────────────────────

/// Body of `POST /api/workload/start`. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkloadRequest {
    /// Concurrent workers, each running correlated actions back to back
    pub concurrency: u32,
    pub duration_secs: u64,
    /// Share of simulated actions that fail, in percent
    pub failure_pct: u8,
    /// Clear probe statistics before the first worker starts
    pub reset: bool,
}

impl Default for WorkloadRequest {
    fn default() -> Self {
        Self {
            concurrency: 4,
            duration_secs: 30,
            failure_pct: 10,
            reset: false,
        }
    }
}

impl WorkloadRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let problem = if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            format!("concurrency must be between 1 and {MAX_CONCURRENCY}")
        } else if !(1..=MAX_DURATION_SECS).contains(&self.duration_secs) {
            format!("duration_secs must be between 1 and {MAX_DURATION_SECS}")
        } else if self.failure_pct > 100 {
            "failure_pct must be between 0 and 100".to_owned()
        } else {
            return Ok(());
        };
        Err(AppError::BadRequest(problem))
    }
}

/// Workload flag plus what the runtime currently holds.
#[derive(Debug, Serialize)]
pub struct WorkloadState {
    pub running: bool,
    pub probes: usize,
    pub in_flight: usize,
}

impl WorkloadState {
    fn of(state: &AppState) -> Self {
        Self {
            running: state.load_running.load(Ordering::Acquire),
            probes: state.runtime.probe_count(),
            in_flight: state.runtime.in_flight(),
        }
    }
}

// ─── POST /api/workload/start ────────────────────────────────────

pub async fn start_workload(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WorkloadRequest>,
) -> Result<Json<WorkloadState>, AppError> {
    req.validate()?;

    // Claim the single workload slot; a concurrent start loses here.
    if state
        .load_running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(AppError::AlreadyRunning);
    }

    if req.reset {
        state.runtime.clear_all();
    }
    tracing::info!(
        concurrency = req.concurrency,
        duration_secs = req.duration_secs,
        failure_pct = req.failure_pct,
        "workload started"
    );

    let handle = tokio::spawn(crate::workload::run(
        state.load_running.clone(),
        state.runtime.clone(),
        req.concurrency,
        req.duration_secs,
        req.failure_pct,
    ));
    // A previous run that finished on its own leaves a completed handle behind.
    state.load_handle.lock().await.replace(handle);

    Ok(Json(WorkloadState::of(&state)))
}

// ─── POST /api/workload/stop ─────────────────────────────────────

/// Idempotent. Waits for the workers to drain before answering.
pub async fn stop_workload(State(state): State<Arc<AppState>>) -> Json<WorkloadState> {
    let was_running = state.load_running.swap(false, Ordering::AcqRel);

    let handle = state.load_handle.lock().await.take();
    if let Some(handle) = handle {
        if let Err(err) = handle.await {
            tracing::warn!(error = %err, "workload task ended abnormally");
        }
    }
    if was_running {
        tracing::info!("workload stopped");
    }

    Json(WorkloadState::of(&state))
}

// ─── GET /api/workload/status ────────────────────────────────────

pub async fn workload_status(State(state): State<Arc<AppState>>) -> Json<WorkloadState> {
    Json(WorkloadState::of(&state))
}
