//! Retry, timeout and permanent-failure handling during collection

use crate::support::{fast_collector, ids, page, Calls, Fault, ScriptedSurface};
use std::time::Duration;
use tempfile::TempDir;
use timeline_harvester::collector::{CollectError, CollectStatus, Session, Termination};
use timeline_harvester::surface::SurfaceError;
use timeline_harvester::FilterMode;

fn http(status: u16) -> Fault {
    Fault::Fail(SurfaceError::Http {
        status,
        url: "https://nitter.test/alice".to_string(),
    })
}

fn network() -> Fault {
    Fault::Fail(SurfaceError::Network("connection reset".to_string()))
}

#[tokio::test]
async fn test_flaky_reads_recover() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_retries(3).with_max_stall(1);
    let mut surface = ScriptedSurface::new(vec![page(1..=3), page(4..=6)])
        .fail_read(network())
        .fail_read(http(503));

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 10), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.status, CollectStatus::Complete);
    assert_eq!(outcome.records.len(), 6);
    assert_eq!(outcome.stats.retries, 2);
}

#[tokio::test]
async fn test_hung_read_times_out_and_is_retried() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir)
        .with_fetch_timeout(Duration::from_millis(20))
        .with_max_stall(1);
    let mut surface = ScriptedSurface::new(vec![page(1..=2)]).fail_read(Fault::Hang);

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        collector.collect(Session::new("alice", FilterMode::Original, 5), &mut surface, None),
    )
    .await
    .expect("hung surface must not hang the session")
    .unwrap();

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.stats.retries, 1);
}

#[tokio::test]
async fn test_retried_read_does_not_advance_again() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_retries(3);
    let mut surface = ScriptedSurface::new(vec![page(1..=2), page(3..=4), page(5..=6)])
        .fail_read(network())
        .fail_read(network())
        .fail_read(network());
    let calls = surface.calls.clone();

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 3), &mut surface, None)
        .await
        .unwrap();

    // a skipped page would lose ids 3..=4
    assert_eq!(ids(&outcome.records), vec!["1", "2", "3", "4", "5", "6"]);
    assert_eq!(Calls::get(&calls.advance), 2);
}

#[tokio::test]
async fn test_failed_advance_is_retried_before_reading() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_retries(2);
    let mut surface = ScriptedSurface::new(vec![page(1..=2), page(3..=4)]).fail_advance(http(429));

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 2), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::BudgetReached);
    assert_eq!(outcome.records.len(), 4);
    assert_eq!(outcome.stats.retries, 1);
}

#[tokio::test]
async fn test_exhausted_retries_return_partial_results() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_retries(2);
    let mut surface = ScriptedSurface::new(vec![page(1..=5), page(6..=10)])
        .fail_advance(http(503))
        .fail_advance(http(502))
        .fail_advance(http(500));

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 10), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.status, CollectStatus::Partial);
    assert_eq!(outcome.termination, Termination::RetriesExhausted);
    assert_eq!(outcome.records.len(), 5);
    assert_eq!(outcome.stats.retries, 2);
    assert!(outcome.last_error.unwrap().contains("500"));
}

#[tokio::test]
async fn test_permanent_error_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_retries(5);
    let mut surface = ScriptedSurface::new(vec![page(1..=3), page(4..=6)]).fail_advance(http(404));

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 10), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::RetriesExhausted);
    assert_eq!(outcome.status, CollectStatus::Partial);
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.stats.retries, 0);
}

#[tokio::test]
async fn test_navigate_failure_is_a_setup_error() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir);
    let mut surface = ScriptedSurface::new(vec![page(1..=3)])
        .fail_navigate(Fault::Fail(SurfaceError::Unavailable("account suspended".to_string())));

    let result = collector
        .collect(Session::new("alice", FilterMode::Original, 10), &mut surface, None)
        .await;

    assert!(matches!(result, Err(CollectError::Setup(SurfaceError::Unavailable(_)))));
}

#[tokio::test]
async fn test_transient_navigate_failure_is_retried() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_stall(1);
    let mut surface = ScriptedSurface::new(vec![page(1..=3)])
        .fail_navigate(network())
        .fail_navigate(Fault::Hang);
    let calls = surface.calls.clone();

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 10), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 3);
    assert_eq!(Calls::get(&calls.navigate), 3);
    assert_eq!(outcome.stats.retries, 2);
}

#[tokio::test]
async fn test_navigate_retries_bounded() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_retries(1);
    let mut surface = ScriptedSurface::new(vec![page(1..=3)])
        .fail_navigate(network())
        .fail_navigate(network());

    let result = collector
        .collect(Session::new("alice", FilterMode::Original, 10), &mut surface, None)
        .await;

    assert!(matches!(result, Err(CollectError::Setup(SurfaceError::Network(_)))));
}
