//! Correlation id lifecycle across sync → async hand-offs.

use std::time::Duration;

use perflog::BeginOptions;
use tokio::time::sleep;

mod common;

#[tokio::test(start_paused = true)]
async fn id_survives_handoff_then_clears() {
    let (rt, records) = common::recording_runtime(300);

    // Synchronous wrapper finishes, async continuation starts shortly after.
    rt.begin_operation("Cart.submit", Some("C1".into()));
    rt.end_operation("Cart.submit", true).unwrap();
    assert_eq!(rt.current_correlation_id(), Some("C1".into()));

    sleep(Duration::from_millis(100)).await;
    assert_eq!(rt.current_correlation_id(), Some("C1".into()));

    rt.begin_operation("Cart.persist", None);
    sleep(Duration::from_millis(500)).await;
    assert_eq!(rt.current_correlation_id(), Some("C1".into()));
    rt.end_operation("Cart.persist", true).unwrap();

    sleep(Duration::from_millis(200)).await;
    assert_eq!(rt.current_correlation_id(), Some("C1".into()));

    sleep(Duration::from_millis(200)).await;
    assert_eq!(rt.current_correlation_id(), None);

    let records = records.lock();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|r| r.correlation_id == Some("C1".into())));
}

#[tokio::test(start_paused = true)]
async fn begin_adopts_current_id() {
    let (rt, records) = common::recording_runtime(300);

    rt.set_current_correlation_id(Some("C1".into()));
    rt.begin_operation("a", None);
    rt.begin_operation("b", None);
    rt.end_operation("b", true).unwrap();
    rt.end_operation("a", false).unwrap();

    let records = records.lock();
    assert_eq!(records[0].name, "b");
    assert_eq!(records[0].correlation_id, Some("C1".into()));
    assert_eq!(records[1].correlation_id, Some("C1".into()));
}

#[tokio::test(start_paused = true)]
async fn nested_operations_hold_the_id() {
    let (rt, _) = common::recording_runtime(300);

    rt.begin_operation("outer", Some("C9".into()));
    rt.begin_operation("inner", None);
    rt.end_operation("inner", true).unwrap();

    // "outer" still in flight: nothing armed
    sleep(Duration::from_secs(2)).await;
    assert_eq!(rt.current_correlation_id(), Some("C9".into()));

    rt.end_operation("outer", true).unwrap();
    sleep(Duration::from_millis(301)).await;
    assert_eq!(rt.current_correlation_id(), None);
}

#[tokio::test(start_paused = true)]
async fn explicit_id_replaces_current() {
    let (rt, records) = common::recording_runtime(300);

    rt.begin_operation("first", Some("C1".into()));
    rt.end_operation("first", true).unwrap();
    rt.begin_operation("second", Some("C2".into()));
    assert_eq!(rt.current_correlation_id(), Some("C2".into()));
    rt.end_operation("second", true).unwrap();

    assert_eq!(records.lock()[1].correlation_id, Some("C2".into()));
}

#[tokio::test(start_paused = true)]
async fn detached_begin_does_not_adopt() {
    let (rt, records) = common::recording_runtime(300);

    rt.begin_operation_with("poll", BeginOptions::with_id("S1").adopt(false));
    assert_eq!(rt.current_correlation_id(), None);
    rt.end_operation("poll", true).unwrap();

    assert_eq!(records.lock()[0].correlation_id, Some("S1".into()));
}

#[tokio::test(start_paused = true)]
async fn churn_keeps_single_timer() {
    let (rt, records) = common::recording_runtime(300);
    rt.set_current_correlation_id(Some("C1".into()));

    for _ in 0..1_000 {
        rt.begin_operation("tick", None);
        rt.end_operation("tick", true).unwrap();
    }
    assert_eq!(records.lock().len(), 1_000);
    assert_eq!(rt.current_correlation_id(), Some("C1".into()));

    sleep(Duration::from_millis(301)).await;
    assert_eq!(rt.current_correlation_id(), None);
}
