use std::path::PathBuf;
use std::sync::Arc;

use perflog::metrics::{ConsoleSink, InstrumentationRuntime, TracingSink};
use perflog::{server, AppState, PerfLogConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perflog=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   ⏱  PERFLOG — OPERATION LATENCY PROBES          ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    // ── 1. Load configuration ────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PERFLOG_CONFIG").ok())
        .map(PathBuf::from);
    let config = match &config_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            PerfLogConfig::load(path)?
        }
        None => PerfLogConfig::default(),
    };

    // ── 2. Build the runtime ─────────────────────────────────────
    // PERFLOG_SINK=console keeps the plain one-line format on stdout.
    let runtime = InstrumentationRuntime::new(&config);
    let runtime = match std::env::var("PERFLOG_SINK").as_deref() {
        Ok("console") => runtime.with_sink(ConsoleSink),
        _ => runtime.with_sink(TracingSink),
    };
    let state = Arc::new(AppState::new(Arc::new(runtime), &config));

    // ── 3. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let addr = config.server.bind_address.as_str();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, quiet_window_ms = config.quiet_window_ms, "listening");
    println!("Statistics JSON → http://{addr}/api/perf");
    println!("Statistics SSE  → http://{addr}/api/perf/stream");
    println!("Demo workload   → POST http://{addr}/api/workload/start");
    println!();

    axum::serve(listener, app).await?;
    Ok(())
}
