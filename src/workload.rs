//! Demo workload: simulated actions that exercise every completion shape.
//!
//! One action = outer probe with a fresh correlation id, wrapping a
//! synchronous step, an awaited step and a single-emission stream. The
//! nested probes inherit the action's id.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::instrument::{measure, measure_async, MeasureStreamExt};
use crate::metrics::{CorrelationId, InstrumentationRuntime};

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks that run actions until the deadline
/// or the `running` flag is cleared.
pub async fn run(
    running: Arc<AtomicBool>,
    runtime: Arc<InstrumentationRuntime>,
    concurrency: u32,
    duration_secs: u64,
    failure_pct: u8,
) {
    let deadline = Instant::now() + Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(concurrency as usize);

    for worker_id in 0..concurrency {
        let running = running.clone();
        let runtime = runtime.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, running, runtime, deadline, failure_pct).await;
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    running.store(false, Ordering::SeqCst);
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    running: Arc<AtomicBool>,
    runtime: Arc<InstrumentationRuntime>,
    deadline: Instant,
    failure_pct: u8,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);
    // Probes are keyed by name, so concurrent workers keep separate names.
    let prefix = format!("worker{id}");

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let ok = run_action(&prefix, &runtime, &mut rng, failure_pct).await;
        tracing::trace!(worker = id, ok, "action done");
    }
}

/// One correlated action. Returns whether every step succeeded.
pub async fn run_action(
    prefix: &str,
    runtime: &Arc<InstrumentationRuntime>,
    rng: &mut StdRng,
    failure_pct: u8,
) -> bool {
    let action = format!("{prefix}.action");
    runtime.begin_operation(&action, Some(CorrelationId::generate()));

    // ── Synchronous step ────────────────────────────────────────
    let fail = rng.gen_range(0u8..100) < failure_pct;
    let validated: Result<(), &str> = measure(runtime, &format!("{prefix}.validate"), || {
        if fail { Err("invalid payload") } else { Ok(()) }
    });

    // ── Awaited step ────────────────────────────────────────────
    let latency = Duration::from_millis(rng.gen_range(1..=20));
    let fail = rng.gen_range(0u8..100) < failure_pct;
    let fetched: Result<(), &str> = measure_async(runtime, &format!("{prefix}.fetch"), async move {
        tokio::time::sleep(latency).await;
        if fail { Err("upstream error") } else { Ok(()) }
    })
    .await;

    // ── Stream step (ends on first emission) ────────────────────
    let latency = Duration::from_millis(rng.gen_range(1..=10));
    let fail = rng.gen_range(0u8..100) < failure_pct;
    let quote: Result<u32, String> = if fail { Err("no quote".into()) } else { Ok(42) };
    let (tx, rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(async move {
        tokio::time::sleep(latency).await;
        let _ = tx.send(quote).await;
    });
    let mut quotes = ReceiverStream::new(rx).measured(runtime.clone(), format!("{prefix}.quote"));
    let quoted = matches!(quotes.next().await, Some(Ok(_)));

    let ok = validated.is_ok() && fetched.is_ok() && quoted;
    let _ = runtime.end_operation(&action, ok);
    ok
}
