//! Checkpoint-based resume across interrupted sessions

use crate::support::{fast_collector, fast_collector_over, ids, page, Calls, Fault, ScriptedSurface};
use std::collections::HashSet;
use tempfile::TempDir;
use timeline_harvester::collector::{CollectError, CollectStatus, Session, Termination};
use timeline_harvester::resume::{Checkpoint, CheckpointStore, ResumeError, SessionKey};
use timeline_harvester::surface::SurfaceError;
use timeline_harvester::FilterMode;

fn pages() -> Vec<Vec<timeline_harvester::extractor::RenderedUnit>> {
    (0..4).map(|p| page(p * 5 + 1..=p * 5 + 5)).collect()
}

#[tokio::test]
async fn test_resume_continues_from_saved_offset() {
    let dir = TempDir::new().unwrap();

    let first = fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 2), &mut ScriptedSurface::new(pages()), None)
        .await
        .unwrap();
    assert_eq!(first.termination, Termination::BudgetReached);
    assert_eq!(first.records.len(), 10);

    let store = CheckpointStore::new(dir.path());
    let saved = store.load(&SessionKey::new("alice", FilterMode::Original)).unwrap().unwrap();
    assert_eq!(saved.scroll_offset(), 2);
    assert_eq!(saved.cursor(), Some("1"));
    assert_eq!(saved.seen_ids().len(), 10);

    let mut surface = ScriptedSurface::new(pages());
    let calls = surface.calls.clone();
    let second = fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 4), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(second.stats.resumed_records, 10);
    assert_eq!(second.stats.new_records, 10);
    assert_eq!(second.stats.batches, 2);
    assert_eq!(second.stats.duplicates, 0);
    assert_eq!(second.stats.scroll_offset, 4);
    assert_eq!(second.records.len(), 20);
    assert_eq!(Calls::get(&calls.seek), 1);

    let unique: HashSet<_> = ids(&second.records).into_iter().collect();
    assert_eq!(unique.len(), 20);

    let reloaded = store.load(&SessionKey::new("alice", FilterMode::Original)).unwrap().unwrap();
    assert_eq!(reloaded.metadata().resumes, 1);
}

#[tokio::test]
async fn test_resume_without_cursor_fast_forwards() {
    let dir = TempDir::new().unwrap();

    fast_collector(&dir)
        .collect(
            Session::new("alice", FilterMode::Original, 2),
            &mut ScriptedSurface::new(pages()).without_cursor(),
            None,
        )
        .await
        .unwrap();

    let mut surface = ScriptedSurface::new(pages()).without_cursor();
    let calls = surface.calls.clone();
    let outcome = fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 3), &mut surface, None)
        .await
        .unwrap();

    // one advance to skip page 1, one to reach page 2
    assert_eq!(Calls::get(&calls.seek), 0);
    assert_eq!(Calls::get(&calls.advance), 2);
    assert_eq!(outcome.stats.new_records, 5);
    assert_eq!(outcome.stats.duplicates, 0);
    assert_eq!(outcome.records.len(), 15);
}

#[tokio::test]
async fn test_resumed_session_never_reemits_ids() {
    let dir = TempDir::new().unwrap();
    let overlapping = || vec![page(1..=5), page(4..=9), page(1..=12)];

    fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 2), &mut ScriptedSurface::new(overlapping()), None)
        .await
        .unwrap();

    let outcome = fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 3), &mut ScriptedSurface::new(overlapping()), None)
        .await
        .unwrap();

    assert_eq!(outcome.stats.resumed_records, 9);
    assert_eq!(outcome.stats.new_records, 3);
    assert_eq!(outcome.stats.duplicates, 9);

    let emitted = ids(&outcome.records);
    let unique: HashSet<_> = emitted.iter().cloned().collect();
    assert_eq!(emitted.len(), unique.len());
    assert_eq!(unique.len(), 12);
}

#[tokio::test]
async fn test_partial_session_completes_on_resume() {
    let dir = TempDir::new().unwrap();
    let mut broken = ScriptedSurface::new(pages())
        .fail_advance(Fault::Fail(SurfaceError::Unavailable("instance down".to_string())));

    let first = fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 4), &mut broken, None)
        .await
        .unwrap();
    assert_eq!(first.status, CollectStatus::Partial);
    assert_eq!(first.records.len(), 5);

    let second = fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 4), &mut ScriptedSurface::new(pages()), None)
        .await
        .unwrap();
    assert_eq!(second.termination, Termination::BudgetReached);
    assert_eq!(second.status, CollectStatus::Complete);
    assert_eq!(second.records.len(), 20);
}

#[tokio::test]
async fn test_sessions_keyed_by_target_and_filter() {
    let dir = TempDir::new().unwrap();

    fast_collector(&dir)
        .collect(Session::new("@Alice", FilterMode::Original, 1), &mut ScriptedSurface::new(pages()), None)
        .await
        .unwrap();

    // a different filter mode starts from scratch
    let other = fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::All, 1), &mut ScriptedSurface::new(pages()), None)
        .await
        .unwrap();
    assert_eq!(other.stats.resumed_records, 0);

    // the same account under another spelling resumes
    let same = fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 1), &mut ScriptedSurface::new(pages()), None)
        .await
        .unwrap();
    assert_eq!(same.stats.resumed_records, 5);
    assert_eq!(same.termination, Termination::BudgetReached);

    let store = CheckpointStore::new(dir.path());
    assert_eq!(store.list().unwrap().len(), 2);
}

#[tokio::test]
async fn test_corrupt_checkpoint_is_fatal_and_kept() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path());
    let key = SessionKey::new("alice", FilterMode::Original);
    std::fs::create_dir_all(dir.path()).unwrap();
    std::fs::write(store.path_for(&key), "{ truncated").unwrap();

    let result = fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 3), &mut ScriptedSurface::new(pages()), None)
        .await;

    assert!(result.is_err());
    assert!(store.path_for(&key).exists());
    assert!(store.load(&key).is_err());
}

#[test]
fn test_checkpoint_rejects_mismatched_session() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path());
    let key = SessionKey::new("alice", FilterMode::Original);

    // a checkpoint for bob saved under alice's file name
    let checkpoint = Checkpoint::new("bob", FilterMode::Original);
    let json = serde_json::to_string(&checkpoint).unwrap();
    std::fs::write(store.path_for(&key), json).unwrap();

    assert!(matches!(
        store.load(&key),
        Err(ResumeError::SessionMismatch { .. })
    ));
}

#[tokio::test]
async fn test_checkpoint_write_failure_mid_session_is_fatal() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path());
    let key = SessionKey::new("alice", FilterMode::Original);
    let checkpoint_path = store.path_for(&key);
    let lock_path = checkpoint_path.with_extension("lock");

    // after the first batch is saved, make the lock path unopenable
    let blocked = lock_path.clone();
    let mut surface = ScriptedSurface::new(pages()).on_read(2, move || {
        std::fs::remove_file(&blocked).unwrap();
        std::fs::create_dir(&blocked).unwrap();
    });

    let result = fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 4), &mut surface, None)
        .await;
    assert!(matches!(
        result,
        Err(CollectError::Checkpoint(ResumeError::LockError(_)))
    ));
    assert_eq!(Calls::get(&surface.calls.read), 2);

    std::fs::remove_dir(&lock_path).unwrap();
    let saved = store.load(&key).unwrap().unwrap();
    assert_eq!(saved.scroll_offset(), 1);
    assert_eq!(saved.records().len(), 5);
}

#[tokio::test]
async fn test_oversized_checkpoint_keeps_last_loadable_state() {
    let dir = TempDir::new().unwrap();
    let key = SessionKey::new("alice", FilterMode::Original);
    let small_then_large = || vec![page(1..=1), page(2..=30), page(31..=31)];

    fast_collector(&dir)
        .collect(Session::new("alice", FilterMode::Original, 1), &mut ScriptedSurface::new(small_then_large()), None)
        .await
        .unwrap();
    let path = CheckpointStore::new(dir.path()).path_for(&key);
    let before = std::fs::read(&path).unwrap();

    let store = CheckpointStore::new(dir.path()).with_max_file_size(before.len() as u64 + 256);
    let result = fast_collector_over(store.clone())
        .collect(Session::new("alice", FilterMode::Original, 3), &mut ScriptedSurface::new(small_then_large()), None)
        .await;
    assert!(matches!(
        result,
        Err(CollectError::Checkpoint(ResumeError::StateTooLarge { .. }))
    ));

    assert_eq!(std::fs::read(&path).unwrap(), before);
    let saved = store.load(&key).unwrap().unwrap();
    assert_eq!(saved.scroll_offset(), 1);
    assert_eq!(ids(saved.records()), vec!["1"]);
}
