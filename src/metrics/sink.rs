use std::io::Write;

use crate::error::SinkError;

use super::CompletionRecord;

/// Consumer of completed measurements. Called synchronously, once per
/// matched `end`, after the runtime's own bookkeeping is done.
pub trait LogSink: Send + Sync {
    fn handle(&self, record: &CompletionRecord) -> Result<(), SinkError>;
}

/// Human-readable one-liner, the same text every sink variant can reuse.
pub fn format_record(record: &CompletionRecord) -> String {
    let id = record
        .correlation_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".into());
    format!(
        "Finished method '{}'; ActionId: {}; Success: {}; Date: {}; Time: {:.3}ms.",
        record.name,
        id,
        record.success,
        record.started_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        record.elapsed_ms(),
    )
}

// ─── Console ─────────────────────────────────────────────────────

/// Default sink: writes [`format_record`] lines to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn handle(&self, record: &CompletionRecord) -> Result<(), SinkError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", format_record(record))?;
        Ok(())
    }
}

// ─── tracing ─────────────────────────────────────────────────────

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn handle(&self, record: &CompletionRecord) -> Result<(), SinkError> {
        tracing::info!(
            probe = %record.name,
            correlation_id = record.correlation_id.as_ref().map(|c| c.as_str()),
            success = record.success,
            started_at = %record.started_at.to_rfc3339(),
            elapsed_ms = record.elapsed_ms(),
            "operation finished"
        );
        Ok(())
    }
}

// ─── Closure / null ──────────────────────────────────────────────

/// Adapts any closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> FnSink<F>
where
    F: Fn(&CompletionRecord) -> Result<(), SinkError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> LogSink for FnSink<F>
where
    F: Fn(&CompletionRecord) -> Result<(), SinkError> + Send + Sync,
{
    fn handle(&self, record: &CompletionRecord) -> Result<(), SinkError> {
        (self.0)(record)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn handle(&self, _record: &CompletionRecord) -> Result<(), SinkError> {
        Ok(())
    }
}
