use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::config::PerfLogConfig;
use crate::error::PerfLogError;

use super::correlation::CorrelationContext;
use super::in_flight::{InFlightEntry, InFlightTracker};
use super::registry::{FlatStats, LogRegistry, Probe};
use super::sink::{ConsoleSink, LogSink};
use super::{CompletionRecord, CorrelationId};

// ─── Public types ────────────────────────────────────────────────

/// Process-wide instrumentation service.
///
/// Collaborators call `begin_operation()` / `end_operation()` around the
/// work they measure; exporters call `snapshot()`. Construct one at
/// startup and share it as `Arc<InstrumentationRuntime>`.
pub struct InstrumentationRuntime {
    inner: Arc<Mutex<Inner>>,
    sink: RwLock<Arc<dyn LogSink>>,
    quiet_window: Duration,
    adopt_correlation: bool,
    warn_on_overwrite: bool,
}

/// Per-call knobs for [`InstrumentationRuntime::begin_operation_with`].
#[derive(Debug, Clone, Default)]
pub struct BeginOptions {
    /// Explicit id; falls back to the current one when `None`
    pub correlation_id: Option<CorrelationId>,
    /// Make the resolved id current. `None` uses the configured default.
    pub adopt: Option<bool>,
}

impl BeginOptions {
    pub fn with_id(id: impl Into<CorrelationId>) -> Self {
        Self {
            correlation_id: Some(id.into()),
            adopt: None,
        }
    }

    pub fn adopt(mut self, adopt: bool) -> Self {
        self.adopt = Some(adopt);
        self
    }
}

// ─── Internal state ──────────────────────────────────────────────

/// Everything mutated by begin/end, serialized under one lock.
struct Inner {
    registry: LogRegistry,
    in_flight: InFlightTracker,
    correlation: CorrelationContext,
}

// ─── InstrumentationRuntime impl ─────────────────────────────────

impl Default for InstrumentationRuntime {
    fn default() -> Self {
        Self::new(&PerfLogConfig::default())
    }
}

impl InstrumentationRuntime {
    pub fn new(config: &PerfLogConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                registry: LogRegistry::new(),
                in_flight: InFlightTracker::new(),
                correlation: CorrelationContext::new(),
            })),
            sink: RwLock::new(Arc::new(ConsoleSink)),
            quiet_window: config.quiet_window(),
            adopt_correlation: config.adopt_correlation,
            warn_on_overwrite: config.warn_on_overwrite,
        }
    }

    pub fn with_sink(self, sink: impl LogSink + 'static) -> Self {
        self.set_sink(sink);
        self
    }

    /// Swap the active sink. Calls already dispatching keep the old one.
    pub fn set_sink(&self, sink: impl LogSink + 'static) {
        *self.sink.write() = Arc::new(sink);
    }

    pub fn begin_operation(&self, name: &str, correlation_id: Option<CorrelationId>) {
        self.begin_operation_with(
            name,
            BeginOptions {
                correlation_id,
                adopt: None,
            },
        );
    }

    pub fn begin_operation_with(&self, name: &str, opts: BeginOptions) {
        self.begin_keyed(name, name, opts);
    }

    /// Open an in-flight entry under `key` that records into `probe`.
    ///
    /// Use a per-invocation key (e.g. `"GET /items#17"`) when the same probe
    /// can be pending more than once at a time; `end_operation(key, ..)`
    /// then closes exactly that invocation. With `key == probe` this is
    /// `begin_operation_with`, including last-write-wins on overlap.
    pub fn begin_keyed(&self, key: &str, probe: &str, opts: BeginOptions) {
        let adopt = opts.adopt.unwrap_or(self.adopt_correlation);
        let mut inner = self.inner.lock();

        inner.registry.get_or_create(probe);
        inner.correlation.supersede();

        let correlation_id = opts
            .correlation_id
            .or_else(|| inner.correlation.current().cloned());
        if adopt && correlation_id.is_some() {
            inner.correlation.set_current(correlation_id.clone());
        }

        let replaced = inner
            .in_flight
            .open(key, InFlightEntry::start_now(probe, correlation_id));

        match replaced {
            Some(old) if self.warn_on_overwrite => {
                tracing::warn!(
                    probe,
                    key,
                    abandoned_ms = old.started.elapsed().as_secs_f64() * 1000.0,
                    "begin on a pending key, earlier timing discarded"
                );
            }
            _ => tracing::debug!(probe, key, "begin"),
        }
    }

    /// Close the pending entry for `name` and record its elapsed time into
    /// the probe it was opened for.
    ///
    /// Unmatched calls are a no-op. The only error is a sink failure, which
    /// is reported after statistics and tracker state are already updated.
    pub fn end_operation(&self, name: &str, success: bool) -> Result<(), PerfLogError> {
        let record = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.in_flight.close(name) else {
                tracing::trace!(probe = name, "end without matching begin");
                return Ok(());
            };
            let elapsed = entry.started.elapsed();

            let record = CompletionRecord {
                name: entry.probe,
                correlation_id: entry.correlation_id,
                success,
                started_at: entry.started_at,
                elapsed,
            };
            inner
                .registry
                .get_or_create(&record.name)
                .append(record.elapsed_ms(), success);

            if inner.in_flight.is_empty() {
                self.schedule_clear(&mut inner);
            }
            tracing::debug!(probe = %record.name, key = name, success, elapsed_ms = record.elapsed_ms(), "end");
            record
        };

        // Lock released: the sink may call back into the runtime.
        let sink = self.sink.read().clone();
        sink.handle(&record).map_err(|source| {
            tracing::warn!(probe = %record.name, error = %source, "sink failed");
            PerfLogError::Sink {
                probe: record.name.clone(),
                source,
            }
        })
    }

    /// Arm the debounced clear. Only worth a timer when there is an id.
    fn schedule_clear(&self, inner: &mut Inner) {
        if inner.correlation.current().is_none() {
            return;
        }
        let shared = Arc::downgrade(&self.inner);
        inner.correlation.arm(self.quiet_window, move |token| {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut inner = shared.lock();
            let idle = inner.in_flight.is_empty();
            if inner.correlation.fire(token, idle) {
                tracing::debug!("correlation id cleared after quiet window");
            }
        });
        tracing::debug!(quiet_ms = self.quiet_window.as_millis() as u64, "correlation clear armed");
    }

    pub fn get_or_create(&self, name: &str) -> Arc<Probe> {
        self.inner.lock().registry.get_or_create(name)
    }

    pub fn probe(&self, name: &str) -> Option<Arc<Probe>> {
        self.inner.lock().registry.get(name)
    }

    /// Flattened statistics, one row per probe in first-seen order.
    pub fn snapshot(&self) -> Vec<FlatStats> {
        self.inner.lock().registry.snapshot()
    }

    /// Reset every probe; names stay registered.
    pub fn clear_all(&self) {
        self.inner.lock().registry.clear_all();
    }

    pub fn current_correlation_id(&self) -> Option<CorrelationId> {
        self.inner.lock().correlation.current().cloned()
    }

    pub fn set_current_correlation_id(&self, id: Option<CorrelationId>) {
        self.inner.lock().correlation.set_current(id);
    }

    pub fn probe_count(&self) -> usize {
        self.inner.lock().registry.len()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.inner.lock().in_flight.contains(name)
    }
}
