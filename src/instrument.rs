//! Call-site wrappers that drive the begin/end contract.
//!
//! Three completion shapes share one runtime contract:
//! - synchronous return (`measure`, `measure_bool`)
//! - future resolution (`measure_async`)
//! - stream emission or error (`MeasuredStream`)
//!
//! Sink failures are owned by the runtime: `end_operation` logs them at
//! `warn` and returns them, and these wrappers drop that return so it never
//! replaces the wrapped operation's own result. Callers that must react to
//! a failing sink use [`measure_reporting`], which hands back both.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use tokio_stream::Stream;

use crate::error::PerfLogError;
use crate::metrics::{BeginOptions, CorrelationId, InstrumentationRuntime};

/// Time a fallible closure. `Ok` counts as success, `Err` or a panic as
/// failure; panics are resumed after recording.
pub fn measure<T, E, F>(runtime: &InstrumentationRuntime, name: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let (result, _sink) = measure_reporting(runtime, name, f);
    result
}

/// [`measure`], also returning the sink outcome for this completion.
///
/// Statistics are updated before the sink runs, so a sink error never
/// means the timing was lost.
pub fn measure_reporting<T, E, F>(
    runtime: &InstrumentationRuntime,
    name: &str,
    f: F,
) -> (Result<T, E>, Result<(), PerfLogError>)
where
    F: FnOnce() -> Result<T, E>,
{
    runtime.begin_operation(name, None);
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    let success = matches!(outcome, Ok(Ok(_)));
    let sink = runtime.end_operation(name, success);

    match outcome {
        Ok(result) => (result, sink),
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Time an infallible closure, judging its output with `check`.
pub fn measure_bool<T, F, P>(runtime: &InstrumentationRuntime, name: &str, f: F, check: P) -> T
where
    F: FnOnce() -> T,
    P: FnOnce(&T) -> bool,
{
    runtime.begin_operation(name, None);
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    let success = outcome.as_ref().map(check).unwrap_or(false);
    let _ = runtime.end_operation(name, success);

    match outcome {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Time a future returning `Result`. If the future is dropped before it
/// resolves, the entry stays open and nothing is recorded.
pub async fn measure_async<T, E, Fut>(
    runtime: &InstrumentationRuntime,
    name: &str,
    fut: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    runtime.begin_operation(name, None);
    let result = fut.await;
    let _ = runtime.end_operation(name, result.is_ok());
    result
}

// ─── Streams ─────────────────────────────────────────────────────

fn always<T>(_: &T) -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Open,
    Closed,
}

/// Measures a `Result` stream from its first poll to its first outcome.
///
/// Begins without adopting the correlation id. The first `Ok` item ends
/// the probe with `check(item)`, an `Err` item ends it as a failure. A
/// stream that finishes before emitting anything ends it as a success,
/// or as set by [`complete_as`](Self::complete_as). After the first
/// outcome, items pass through untouched.
pub struct MeasuredStream<S, C> {
    inner: S,
    runtime: Arc<InstrumentationRuntime>,
    name: String,
    correlation_id: Option<CorrelationId>,
    check: C,
    empty_success: bool,
    phase: Phase,
}

impl<S, C> MeasuredStream<S, C> {
    pub fn with_correlation(mut self, id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Outcome recorded when the stream ends without emitting.
    pub fn complete_as(mut self, success: bool) -> Self {
        self.empty_success = success;
        self
    }

    fn finish(&mut self, success: bool) {
        self.phase = Phase::Closed;
        let _ = self.runtime.end_operation(&self.name, success);
    }
}

pub fn measure_stream<S, T, E>(
    stream: S,
    runtime: Arc<InstrumentationRuntime>,
    name: impl Into<String>,
) -> MeasuredStream<S, fn(&T) -> bool>
where
    S: Stream<Item = Result<T, E>>,
{
    measure_stream_with(stream, runtime, name, always::<T> as fn(&T) -> bool)
}

pub fn measure_stream_with<S, T, E, C>(
    stream: S,
    runtime: Arc<InstrumentationRuntime>,
    name: impl Into<String>,
    check: C,
) -> MeasuredStream<S, C>
where
    S: Stream<Item = Result<T, E>>,
    C: Fn(&T) -> bool,
{
    MeasuredStream {
        inner: stream,
        runtime,
        name: name.into(),
        correlation_id: None,
        check,
        empty_success: true,
        phase: Phase::Idle,
    }
}

impl<S, T, E, C> Stream for MeasuredStream<S, C>
where
    S: Stream<Item = Result<T, E>> + Unpin,
    C: Fn(&T) -> bool + Unpin,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.phase == Phase::Idle {
            this.phase = Phase::Open;
            this.runtime.begin_operation_with(
                &this.name,
                BeginOptions {
                    correlation_id: this.correlation_id.clone(),
                    adopt: Some(false),
                },
            );
        }

        let item = ready!(Pin::new(&mut this.inner).poll_next(cx));
        if this.phase == Phase::Open {
            match &item {
                Some(Ok(value)) => {
                    let ok = (this.check)(value);
                    this.finish(ok);
                }
                Some(Err(_)) => this.finish(false),
                None => {
                    tracing::debug!(probe = %this.name, success = this.empty_success, "stream ended without items");
                    this.finish(this.empty_success);
                }
            }
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// `.measured(runtime, name)` on any `Result` stream.
pub trait MeasureStreamExt<T, E>: Stream<Item = Result<T, E>> + Sized {
    fn measured(
        self,
        runtime: Arc<InstrumentationRuntime>,
        name: impl Into<String>,
    ) -> MeasuredStream<Self, fn(&T) -> bool> {
        measure_stream(self, runtime, name)
    }
}

impl<S, T, E> MeasureStreamExt<T, E> for S where S: Stream<Item = Result<T, E>> + Sized {}
