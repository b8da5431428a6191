pub mod correlation;
pub mod in_flight;
pub mod registry;
pub mod runtime;
pub mod sink;
pub mod stats;
pub mod stream;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use registry::{FlatStats, LogRegistry, Probe};
pub use runtime::{BeginOptions, InstrumentationRuntime};
pub use sink::{ConsoleSink, FnSink, LogSink, NullSink, TracingSink};
pub use stats::StatAccumulator;

/// Opaque value grouping several probe invocations under one logical action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for CorrelationId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<uuid::Uuid> for CorrelationId {
    fn from(u: uuid::Uuid) -> Self {
        Self(u.to_string())
    }
}

/// A single finished operation, handed to the sink once per matched `end`.
/// This is the "write" side of the runtime's output.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRecord {
    /// Probe name, e.g. "GET /api/perf"
    pub name: String,
    pub correlation_id: Option<CorrelationId>,
    pub success: bool,
    /// Wall-clock time the matching `begin` was recorded
    pub started_at: DateTime<Utc>,
    /// Monotonic time between `begin` and `end`
    pub elapsed: Duration,
}

impl CompletionRecord {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}
