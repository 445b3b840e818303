//! End-to-end collection sessions over scripted surfaces

use crate::support::{fast_collector, ids, malformed_unit, page, unit, unit_of, Kind, ScriptedSurface};
use std::collections::HashSet;
use tempfile::TempDir;
use timeline_harvester::collector::{CollectStatus, Session, Termination};
use timeline_harvester::resume::{CheckpointStore, SessionKey};
use timeline_harvester::FilterMode;

#[tokio::test]
async fn test_source_exhaustion_after_empty_batch() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_stall(1);
    let mut surface = ScriptedSurface::new(vec![page(1..=10), page(11..=20), vec![]]);

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 10), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::Exhausted);
    assert_eq!(outcome.status, CollectStatus::Complete);
    assert!(outcome.is_complete());
    assert_eq!(outcome.records.len(), 20);
    assert_eq!(outcome.stats.batches, 3);
    assert_eq!(outcome.stats.scroll_offset, 3);
    assert!(outcome.last_error.is_none());
}

#[tokio::test]
async fn test_stall_tolerates_empty_batches_below_bound() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_stall(3);
    let mut surface = ScriptedSurface::new(vec![page(1..=3), vec![], vec![], page(4..=5), vec![], vec![], vec![]]);

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 20), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::Exhausted);
    assert_eq!(outcome.records.len(), 5);
    assert_eq!(outcome.stats.batches, 7);
}

#[tokio::test]
async fn test_budget_bounds_batches() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir);
    let mut surface = ScriptedSurface::new((0..5).map(|p| page(p * 10 + 1..=p * 10 + 10)).collect());

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 2), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::BudgetReached);
    assert_eq!(outcome.status, CollectStatus::Complete);
    assert_eq!(outcome.stats.batches, 2);
    assert_eq!(outcome.records.len(), 20);
}

#[tokio::test]
async fn test_malformed_unit_is_counted_not_fatal() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_stall(1);
    let mut first = page(1..=9);
    first.insert(4, malformed_unit());
    let mut surface = ScriptedSurface::new(vec![first]);

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 5), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 9);
    assert_eq!(outcome.stats.malformed, 1);
    assert_eq!(outcome.status, CollectStatus::Complete);

    let store = CheckpointStore::new(dir.path());
    let checkpoint = store
        .load(&SessionKey::new("alice", FilterMode::Original))
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.metadata().malformed_units, 1);
}

#[tokio::test]
async fn test_filter_modes_select_post_types() {
    let mixed = || {
        vec![vec![
            unit_of(1, Kind::Original),
            unit_of(2, Kind::Retweet),
            unit_of(3, Kind::Quote),
            unit_of(4, Kind::Reply),
        ]]
    };

    let mut kept = Vec::new();
    for mode in [FilterMode::Original, FilterMode::OriginalAndQuotes, FilterMode::All] {
        let dir = TempDir::new().unwrap();
        let collector = fast_collector(&dir).with_max_stall(1);
        let mut surface = ScriptedSurface::new(mixed());
        let outcome = collector
            .collect(Session::new("alice", mode, 5), &mut surface, None)
            .await
            .unwrap();

        for record in &outcome.records {
            assert!(mode.accepts(record), "{mode} let through {}", record.post_id);
        }
        assert_eq!(outcome.stats.filtered + outcome.records.len(), 4);
        kept.push(ids(&outcome.records).into_iter().collect::<HashSet<_>>());
    }

    let expected = |ids: &[&str]| ids.iter().map(|s| s.to_string()).collect::<HashSet<_>>();
    assert_eq!(kept[0], expected(&["1", "4"]));
    assert_eq!(kept[1], expected(&["1", "3", "4"]));
    assert_eq!(kept[2], expected(&["1", "2", "3", "4"]));
    assert!(kept[0].is_subset(&kept[1]) && kept[1].is_subset(&kept[2]));
}

#[tokio::test]
async fn test_extracted_fields_survive_collection() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_stall(1);
    let mut surface = ScriptedSurface::new(vec![vec![unit_of(7, Kind::Reply)]]);

    let outcome = collector
        .collect(Session::new("alice", FilterMode::All, 3), &mut surface, None)
        .await
        .unwrap();

    let record = &outcome.records[0];
    assert_eq!(record.post_id, "7");
    assert_eq!(record.text, "post 7 about #rust");
    assert_eq!(record.hashtags, vec!["#rust".to_string()]);
    assert!(record.is_reply && record.reply_to_id.is_some());
    assert_eq!((record.comment_count, record.retweet_count, record.like_count), (1, 2, 3));
    assert!(record.created_at.is_some());
    assert!(record.validate().is_ok());
}

#[tokio::test]
async fn test_duplicates_across_batches_emitted_once() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_stall(1);
    let mut surface = ScriptedSurface::new(vec![page(1..=5), page(4..=8), page(1..=8)]);

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 10), &mut surface, None)
        .await
        .unwrap();

    let emitted = ids(&outcome.records);
    let unique: HashSet<_> = emitted.iter().collect();
    assert_eq!(emitted.len(), 8);
    assert_eq!(unique.len(), 8);
    assert_eq!(outcome.stats.duplicates, 2 + 8);
    // third batch added nothing
    assert_eq!(outcome.termination, Termination::Exhausted);
}

#[tokio::test]
async fn test_first_batch_is_read_without_advancing() {
    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir);
    let mut surface = ScriptedSurface::new(vec![vec![unit(1)], vec![unit(2)], vec![unit(3)]]);
    let calls = surface.calls.clone();

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 3), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(ids(&outcome.records), vec!["1", "2", "3"]);
    assert_eq!(crate::support::Calls::get(&calls.navigate), 1);
    assert_eq!(crate::support::Calls::get(&calls.advance), 2);
    assert_eq!(crate::support::Calls::get(&calls.read), 3);
}

#[tokio::test]
async fn test_replay_surface_from_saved_pages() {
    use timeline_harvester::surface::ReplaySurface;

    let pages = TempDir::new().unwrap();
    for (name, range) in [("001.html", 1..=3u64), ("002.html", 4..=6)] {
        let body: String = range.map(|id| unit(id).markup).collect::<Vec<_>>().join("\n");
        std::fs::write(
            pages.path().join(name),
            format!("<div class=\"timeline\">{body}</div>"),
        )
        .unwrap();
    }

    let dir = TempDir::new().unwrap();
    let collector = fast_collector(&dir).with_max_stall(1);
    let mut surface = ReplaySurface::from_dir(pages.path()).unwrap();

    let outcome = collector
        .collect(Session::new("alice", FilterMode::Original, 10), &mut surface, None)
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 6);
    assert_eq!(outcome.termination, Termination::Exhausted);
}
