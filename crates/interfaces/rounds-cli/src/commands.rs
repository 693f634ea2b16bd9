use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use rounds_core::{ScheduleStatus, ServiceDate};
use rounds_persistence::{CacheStore, DbState, RedbCacheStore};
use rounds_sync::{
    default_engine, Clock, DocumentStore, Freshness, HttpDocumentStore, ScheduleSyncEngine,
    SystemClock, SCHEDULES_COLLECTION,
};

use crate::CliStatus;

fn build_engine(remote: &str, cache_root: &Utf8PathBuf, collector: &str) -> Result<ScheduleSyncEngine> {
    let client = reqwest::Client::new();
    default_engine(client, remote, cache_root.clone(), collector)
        .context("Failed to construct sync engine")
}

pub async fn cmd_fetch(
    remote: String,
    cache_root: Utf8PathBuf,
    collector: String,
    date: Option<String>,
) -> Result<()> {
    let date: ServiceDate = match date {
        Some(raw) => raw.parse()?,
        None => SystemClock.today(),
    };
    println!(":: Schedules for {} on {}", collector, date);

    let engine = build_engine(&remote, &cache_root, &collector)?;
    let outcome = engine.fetch_schedules(date).await?;

    match outcome.freshness {
        Freshness::Remote => println!("   Source: remote (authoritative)"),
        Freshness::CacheFallback => println!("   Source: local cache (remote unreachable)"),
    }
    if outcome.stats.replayed > 0 {
        println!("   Replayed {} queued update(s)", outcome.stats.replayed);
    }
    if outcome.stats.pending_remaining > 0 {
        println!(
            "   {} update(s) still queued for replay",
            outcome.stats.pending_remaining
        );
    }

    if outcome.schedules.is_empty() {
        println!("   No schedules.");
        return Ok(());
    }
    for schedule in &outcome.schedules {
        let mut line = format!(
            "   [{}] {} - {}",
            schedule.status, schedule.schedule_id, schedule.area_info
        );
        if let Some(reason) = &schedule.reason {
            line.push_str(&format!(" ({reason})"));
        }
        println!("{line}");
    }
    Ok(())
}

pub async fn cmd_mark(
    remote: String,
    cache_root: Utf8PathBuf,
    collector: String,
    schedule_id: String,
    status: CliStatus,
    reason: Option<String>,
) -> Result<()> {
    let status: ScheduleStatus = status.into();
    if status.requires_reason() && reason.is_none() {
        anyhow::bail!("--reason is required when marking a stop {status}");
    }

    let engine = build_engine(&remote, &cache_root, &collector)?;
    let applied = engine.update_status(&schedule_id, status, reason).await?;
    if !applied {
        anyhow::bail!("Unknown schedule id {schedule_id}");
    }
    println!(":: Marked {} as {}", schedule_id, status);

    let store = RedbCacheStore::new();
    let queued = store.list_pending(&cache_root).unwrap_or_default();
    if queued.iter().any(|p| p.schedule_id == schedule_id) {
        println!("   Remote unreachable; change queued for replay");
    }
    Ok(())
}

pub fn cmd_pending(cache_root: Utf8PathBuf) -> Result<()> {
    let store = RedbCacheStore::new();
    let queued = store.list_pending(&cache_root)?;
    println!(":: Pending updates: {}", queued.len());
    for update in &queued {
        let mut line = format!("   {} -> {}", update.schedule_id, update.status);
        if let Some(reason) = &update.reason {
            line.push_str(&format!(" ({reason})"));
        }
        line.push_str(&format!(", queued {}", update.queued_at));
        println!("{line}");
    }
    Ok(())
}

pub async fn cmd_replay(remote: String, cache_root: Utf8PathBuf, collector: String) -> Result<()> {
    let engine = build_engine(&remote, &cache_root, &collector)?;
    let outcome = engine.replay_pending().await;

    println!(":: Replay complete");
    println!("   Attempted: {}", outcome.attempted);
    println!("   Synced:    {}", outcome.synced);
    if outcome.attempted > outcome.synced {
        println!("   Remaining: {}", outcome.attempted - outcome.synced);
    }
    Ok(())
}

pub async fn cmd_status(remote: String, cache_root: Utf8PathBuf, collector: String) -> Result<()> {
    println!(":: Cache status for {}", cache_root);

    let store = RedbCacheStore::new();
    let label = match store.validate(&cache_root)? {
        DbState::Missing => "missing (empty)".to_string(),
        DbState::Valid => "valid".to_string(),
        DbState::Busy => "busy".to_string(),
        DbState::Corrupt => "corrupt (quarantined)".to_string(),
        DbState::NewerSchema { found, supported } => {
            format!("newer schema {found} (supported up to {supported})")
        }
    };
    println!("   Database:         {label}");
    println!(
        "   Cached schedules: {}",
        store.load_schedules(&cache_root)?.len()
    );
    match store.seeded_for(&cache_root)? {
        Some(date) => println!("   Seeded for:       {date}"),
        None => println!("   Seeded for:       never"),
    }
    println!(
        "   Pending updates:  {}",
        store.list_pending(&cache_root)?.len()
    );

    let engine = build_engine(&remote, &cache_root, &collector)?;
    match engine.validate_remote().await {
        Ok(()) => println!("   Remote:           reachable"),
        Err(e) => println!("   Remote:           unreachable ({e})"),
    }
    Ok(())
}

pub async fn cmd_show(remote: String, schedule_id: String) -> Result<()> {
    let store = HttpDocumentStore::new(reqwest::Client::new(), &remote)?;
    match store.get(SCHEDULES_COLLECTION, &schedule_id).await? {
        Some(doc) => {
            let schedule = doc
                .into_schedule()
                .context("Undecodable schedule document")?;
            println!(":: {}", schedule.schedule_id);
            println!("   Area:      {}", schedule.area_info);
            println!("   Date:      {}", schedule.pickup_date);
            println!("   Status:    {}", schedule.status);
            println!("   Collector: {}", schedule.assigned_collector_id);
            if let Some(reason) = &schedule.reason {
                println!("   Reason:    {reason}");
            }
            if let Some(timestamp) = &schedule.timestamp {
                println!("   Updated:   {timestamp}");
            }
        }
        None => println!(":: No document {schedule_id}"),
    }
    Ok(())
}
