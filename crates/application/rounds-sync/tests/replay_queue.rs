mod common;

use common::{engine_at, utf8_root, ScriptedRemote, SharedClock};
use rounds_core::{ScheduleStatus, ServiceDate};
use rounds_persistence::{CacheStore, RedbCacheStore};
use rounds_sync::SeedConfig;
use tempfile::tempdir;

fn seed_remote_with_standard_route(remote: &ScriptedRemote, date: &str) {
    let seeds = SeedConfig::for_collector("collector123").build_for_date(date.parse().unwrap());
    for schedule in &seeds {
        remote.insert_schedule(schedule);
    }
}

#[tokio::test]
async fn queued_updates_drain_once_connectivity_returns() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let remote = ScriptedRemote::offline();
    seed_remote_with_standard_route(&remote, "2025-05-30");
    let engine = engine_at(remote.clone(), SharedClock::at("2025-05-30"), root.clone());
    let today: ServiceDate = "2025-05-30".parse().unwrap();

    engine.fetch_schedules(today).await.unwrap();
    engine
        .update_status(
            "harbor-market-row-2025-05-30",
            ScheduleStatus::Completed,
            None,
        )
        .await
        .unwrap();
    engine
        .update_status(
            "cedar-lane-north-2025-05-30",
            ScheduleStatus::Missed,
            Some("bins not out".into()),
        )
        .await
        .unwrap();

    let store = RedbCacheStore::new();
    assert_eq!(store.list_pending(&root).unwrap().len(), 2);

    remote.set_online(true);
    let outcome = engine.replay_pending().await;
    assert_eq!(outcome.attempted, 2);
    assert_eq!(outcome.synced, 2);
    assert!(store.list_pending(&root).unwrap().is_empty());

    let committed = remote.doc("cedar-lane-north-2025-05-30").unwrap();
    assert_eq!(committed["status"], "Missed");
    assert_eq!(committed["reason"], "bins not out");
}

#[tokio::test]
async fn failed_entries_stay_queued_for_the_next_attempt() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let remote = ScriptedRemote::offline();
    seed_remote_with_standard_route(&remote, "2025-05-30");
    let engine = engine_at(remote.clone(), SharedClock::at("2025-05-30"), root.clone());
    let today: ServiceDate = "2025-05-30".parse().unwrap();

    engine.fetch_schedules(today).await.unwrap();
    for id in [
        "harbor-market-row-2025-05-30",
        "cedar-lane-north-2025-05-30",
        "old-mill-estate-2025-05-30",
    ] {
        engine
            .update_status(id, ScheduleStatus::Completed, None)
            .await
            .unwrap();
    }

    remote.set_online(true);
    remote.fail_for("cedar-lane-north-2025-05-30");
    let first = engine.replay_pending().await;
    assert_eq!(first.attempted, 3);
    assert_eq!(first.synced, 2);

    let store = RedbCacheStore::new();
    let remaining = store.list_pending(&root).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].schedule_id, "cedar-lane-north-2025-05-30");

    remote.clear_failures();
    let second = engine.replay_pending().await;
    assert_eq!(second.attempted, 1);
    assert_eq!(second.synced, 1);
    assert!(store.list_pending(&root).unwrap().is_empty());
}

#[tokio::test]
async fn fetch_replays_opportunistically_before_querying() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let remote = ScriptedRemote::offline();
    seed_remote_with_standard_route(&remote, "2025-05-30");
    let engine = engine_at(remote.clone(), SharedClock::at("2025-05-30"), root);
    let today: ServiceDate = "2025-05-30".parse().unwrap();

    engine.fetch_schedules(today).await.unwrap();
    engine
        .update_status(
            "riverside-terrace-2025-05-30",
            ScheduleStatus::OnHold,
            Some("gate locked".into()),
        )
        .await
        .unwrap();

    remote.set_online(true);
    let outcome = engine.fetch_schedules(today).await.unwrap();
    assert_eq!(outcome.stats.replayed, 1);
    assert_eq!(outcome.stats.pending_remaining, 0);

    // The replayed change is visible in what the remote now serves.
    let replayed = outcome
        .schedules
        .iter()
        .find(|s| s.schedule_id == "riverside-terrace-2025-05-30")
        .unwrap();
    assert_eq!(replayed.status, ScheduleStatus::OnHold);
    assert_eq!(replayed.reason.as_deref(), Some("gate locked"));
}
