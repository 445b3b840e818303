//! Graceful shutdown of collection sessions

use crate::support::{fast_collector, page, ScriptedSurface};
use std::time::Duration;
use tempfile::TempDir;
use timeline_harvester::collector::{CollectStatus, Session, Termination};
use timeline_harvester::resume::{CheckpointStore, SessionKey};
use timeline_harvester::shutdown::ShutdownCoordinator;
use timeline_harvester::FilterMode;

fn pages() -> Vec<Vec<timeline_harvester::extractor::RenderedUnit>> {
    (0..5).map(|p| page(p * 4 + 1..=p * 4 + 4)).collect()
}

#[tokio::test]
async fn shutdown_notifies_waiters() {
    let shutdown = ShutdownCoordinator::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait_for_shutdown().await;
            true
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn shutdown_already_requested_does_not_block_waiters() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let handle = shutdown.clone();
    let waiter = tokio::spawn(async move {
        handle.wait_for_shutdown().await;
        true
    });

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok(), "wait_for_shutdown() blocked after shutdown was requested");
}

#[tokio::test]
async fn shutdown_before_start_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let mut surface = ScriptedSurface::new(pages());
    let calls = surface.calls.clone();
    let outcome = fast_collector(&dir)
        .with_shutdown(shutdown)
        .collect(Session::new("alice", FilterMode::Original, 5), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.status, CollectStatus::Partial);
    assert!(outcome.records.is_empty());
    assert_eq!(crate::support::Calls::get(&calls.navigate), 0);
}

#[tokio::test]
async fn shutdown_mid_session_keeps_finished_batches() {
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();

    let mut surface = ScriptedSurface::new(pages()).shutdown_on_read(2, shutdown.clone());
    let outcome = fast_collector(&dir)
        .with_shutdown(shutdown)
        .collect(Session::new("alice", FilterMode::Original, 5), &mut surface, None)
        .await
        .unwrap();

    // the batch in flight when the signal arrived is finished and saved
    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.status, CollectStatus::Partial);
    assert_eq!(outcome.records.len(), 8);
    assert_eq!(outcome.stats.scroll_offset, 2);

    let store = CheckpointStore::new(dir.path());
    let saved = store
        .load(&SessionKey::new("alice", FilterMode::Original))
        .unwrap()
        .unwrap();
    assert_eq!(saved.scroll_offset(), 2);
    assert_eq!(saved.records().len(), 8);

    // a fresh run picks up where the cancelled one stopped
    let resumed = fast_collector(&dir)
        .with_shutdown(ShutdownCoordinator::shared())
        .collect(Session::new("alice", FilterMode::Original, 5), &mut ScriptedSurface::new(pages()), None)
        .await
        .unwrap();
    assert_eq!(resumed.termination, Termination::BudgetReached);
    assert_eq!(resumed.stats.resumed_records, 8);
    assert_eq!(resumed.records.len(), 20);
}

#[tokio::test]
async fn shutdown_interrupts_scroll_delay() {
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    let collector = fast_collector(&dir)
        .with_scroll_delay(Duration::from_secs(30))
        .with_shutdown(shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.request_shutdown();
        }
    });

    let mut surface = ScriptedSurface::new(pages());
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        collector.collect(Session::new("alice", FilterMode::Original, 5), &mut surface, None),
    )
    .await
    .expect("shutdown must cut the scroll delay short")
    .unwrap();

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.records.len(), 4);
}

#[tokio::test]
async fn shutdown_interrupts_retry_backoff() {
    use crate::support::Fault;
    use timeline_harvester::collector::BackoffPolicy;
    use timeline_harvester::surface::SurfaceError;

    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    let collector = fast_collector(&dir)
        .with_backoff(BackoffPolicy::new(Duration::from_secs(30), Duration::from_secs(60)))
        .with_shutdown(shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.request_shutdown();
        }
    });

    let mut surface = ScriptedSurface::new(pages())
        .fail_read(Fault::Fail(SurfaceError::Network("reset".to_string())));
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        collector.collect(Session::new("alice", FilterMode::Original, 5), &mut surface, None),
    )
    .await
    .expect("shutdown must cut the backoff short")
    .unwrap();

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert!(outcome.records.is_empty());
}
