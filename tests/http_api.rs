//! HTTP export surface, driven through the router without a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use perflog::middleware::timing;
use perflog::{server, AppState, PerfLogConfig};
use serde_json::Value;
use tower::ServiceExt;

mod common;

fn app() -> (Router, Arc<perflog::InstrumentationRuntime>) {
    let (runtime, _) = common::recording_runtime(5_000);
    let state = Arc::new(AppState::new(runtime.clone(), &PerfLogConfig::default()));
    (server::create_router(state), runtime)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            req = req.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn snapshot_lists_probes_with_null_aggregates() {
    let (app, rt) = app();
    rt.begin_operation("Repo.load", None);
    rt.end_operation("Repo.load", true).unwrap();
    rt.get_or_create("Repo.idle");

    let (status, body) = call(&app, "GET", "/api/perf", None).await;
    assert_eq!(status, StatusCode::OK);

    let rows = body.as_array().unwrap();
    assert_eq!(rows[0]["name"], "Repo.load");
    assert_eq!(rows[0]["success_count"], 1);
    assert!(rows[0]["success_std_dev"].is_null());
    assert_eq!(rows[1]["name"], "Repo.idle");
    assert!(rows[1]["success_mean"].is_null());
}

#[tokio::test]
async fn requests_are_instrumented() {
    let (app, rt) = app();
    let (status, _) = call(&app, "GET", "/api/workload/status", None).await;
    assert_eq!(status, StatusCode::OK);

    let probe = rt.probe("GET /api/workload/status").unwrap();
    assert_eq!(probe.successes(), 1);
}

#[tokio::test]
async fn timing_headers_present() {
    let (app, _) = app();
    let resp = app
        .oneshot(Request::get("/api/perf").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(resp.headers().contains_key("x-response-time-us"));
    assert!(resp.headers().contains_key("server-timing"));
}

#[tokio::test]
async fn clear_resets_counts() {
    let (app, rt) = app();
    rt.begin_operation("job", None);
    rt.end_operation("job", false).unwrap();

    let (status, _) = call(&app, "POST", "/api/perf/clear", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let job = rt.probe("job").unwrap();
    assert_eq!(job.failures(), 0);
    assert!(job.failure_mean().is_nan());
}

#[tokio::test]
async fn correlation_round_trip() {
    let (app, rt) = app();

    let (status, body) = call(
        &app,
        "PUT",
        "/api/perf/correlation",
        Some(serde_json::json!({ "correlation_id": "req-42" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correlation_id"], "req-42");
    assert_eq!(rt.current_correlation_id(), Some("req-42".into()));

    let (_, body) = call(&app, "GET", "/api/perf/correlation", None).await;
    assert_eq!(body["correlation_id"], "req-42");
}

#[tokio::test]
async fn blank_correlation_rejected() {
    let (app, _) = app();
    let (status, body) = call(
        &app,
        "PUT",
        "/api/perf/correlation",
        Some(serde_json::json!({ "correlation_id": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn workload_validation() {
    let (app, _) = app();
    let (status, _) = call(
        &app,
        "POST",
        "/api/workload/start",
        Some(serde_json::json!({ "concurrency": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app, "GET", "/api/workload/status", None).await;
    assert_eq!(body["running"], false);
}

#[tokio::test]
async fn workload_start_stop() {
    let (app, rt) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/workload/start",
        Some(serde_json::json!({ "concurrency": 1, "duration_secs": 5, "failure_pct": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], true);

    let (status, _) = call(&app, "POST", "/api/workload/start", Some(serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let (_, body) = call(&app, "POST", "/api/workload/stop", None).await;
    assert_eq!(body["running"], false);

    assert!(rt.probe("worker0.action").is_some());
}

#[tokio::test]
async fn concurrent_starts_admit_exactly_one() {
    let (app, _) = app();
    let body = serde_json::json!({ "concurrency": 1, "duration_secs": 5 });

    let (a, b) = tokio::join!(
        call(&app, "POST", "/api/workload/start", Some(body.clone())),
        call(&app, "POST", "/api/workload/start", Some(body)),
    );
    let mut statuses = [a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    let (status, body) = call(&app, "POST", "/api/workload/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
    // The stop request itself is still open while the body is built.
    assert_eq!(body["in_flight"], 1);
}

#[tokio::test]
async fn stop_when_idle_is_ok() {
    let (app, _) = app();
    let (status, body) = call(&app, "POST", "/api/workload/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
}

#[tokio::test]
async fn overlapping_requests_on_one_route_both_recorded() {
    let (runtime, records) = common::recording_runtime(5_000);
    let state = Arc::new(AppState::new(runtime.clone(), &PerfLogConfig::default()));
    let app = Router::new()
        .route(
            "/slow/:id",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                "done"
            }),
        )
        .layer(from_fn_with_state(state.clone(), timing::timing_middleware))
        .with_state(state);

    let (a, b) = tokio::join!(
        app.clone().oneshot(Request::get("/slow/1").body(Body::empty()).unwrap()),
        app.clone().oneshot(Request::get("/slow/2").body(Body::empty()).unwrap()),
    );
    assert_eq!(a.unwrap().status(), StatusCode::OK);
    assert_eq!(b.unwrap().status(), StatusCode::OK);

    let probe = runtime.probe("GET /slow/:id").unwrap();
    assert_eq!(probe.successes(), 2);
    assert!(probe.success_min() >= 40.0, "each timed on its own: {}", probe.success_min());
    assert_eq!(runtime.in_flight(), 0);
    assert_eq!(runtime.snapshot().len(), 1);
    assert!(records.lock().iter().all(|r| r.name == "GET /slow/:id"));
}
