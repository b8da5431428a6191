//! Operation latency instrumentation with correlated probes.
//!
//! ```text
//!  call site ──begin──▶ InstrumentationRuntime ──end──▶ LogSink
//!                        │  LogRegistry   (probe → success/failure stats)
//!                        │  InFlightTracker (key → probe, start time, id)
//!                        └  CorrelationContext (current id, debounced clear)
//! ```
//!
//! `instrument` wraps sync, async and stream call sites; `server` exposes
//! the statistics over HTTP.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod instrument;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod workload;

pub use config::PerfLogConfig;
pub use error::{PerfLogError, SinkError};
pub use metrics::{
    BeginOptions, CompletionRecord, CorrelationId, FlatStats, InstrumentationRuntime, LogSink,
};

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Process-wide instrumentation runtime — middleware and workload
    /// record into it, the export endpoints read snapshots.
    pub runtime: Arc<InstrumentationRuntime>,

    /// SSE snapshot cadence (ms)
    pub stream_interval_ms: u64,

    /// Flag checked by every workload worker on each iteration.
    pub load_running: Arc<AtomicBool>,

    /// Handle to the spawned workload task so we can await clean shutdown.
    pub load_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl AppState {
    pub fn new(runtime: Arc<InstrumentationRuntime>, config: &PerfLogConfig) -> Self {
        Self {
            runtime,
            stream_interval_ms: config.server.stream_interval_ms,
            load_running: Arc::new(AtomicBool::new(false)),
            load_handle: tokio::sync::Mutex::new(None),
        }
    }
}
