//! Shared helpers for integration tests.

use std::sync::Arc;

use parking_lot::Mutex;
use perflog::metrics::{FnSink, InstrumentationRuntime};
use perflog::{CompletionRecord, PerfLogConfig};

/// Runtime with the given quiet window whose sink collects every record.
#[allow(dead_code)]
pub fn recording_runtime(
    quiet_window_ms: u64,
) -> (Arc<InstrumentationRuntime>, Arc<Mutex<Vec<CompletionRecord>>>) {
    let config = PerfLogConfig {
        quiet_window_ms,
        ..PerfLogConfig::default()
    };
    let records = Arc::new(Mutex::new(Vec::new()));
    let out = records.clone();
    let runtime = InstrumentationRuntime::new(&config).with_sink(FnSink::new(move |r| {
        out.lock().push(r.clone());
        Ok(())
    }));
    (Arc::new(runtime), records)
}
