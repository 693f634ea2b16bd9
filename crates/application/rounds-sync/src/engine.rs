use std::sync::Arc;

use camino::Utf8PathBuf;
use futures::StreamExt;
use rounds_core::{PendingUpdate, PickupSchedule, ScheduleStatus, ServiceDate, StatusPatch};
use rounds_persistence::CacheStore;
use tokio::sync::Mutex;

use crate::clock::{status_timestamp, Clock};
use crate::remote::{DocumentStore, FieldFilter, RemoteError, SCHEDULES_COLLECTION};
use crate::seed::SeedConfig;
use crate::session::SessionProvider;
use crate::{FetchOutcome, FetchStats, Freshness, ReplayOutcome, SyncError};

/// Single entry point for schedule reads and writes; owns the decision of
/// remote-vs-cache precedence and the pending-update queue.
pub struct ScheduleSyncEngine {
    remote: Box<dyn DocumentStore>,
    cache: Arc<dyn CacheStore>,
    session: Box<dyn SessionProvider>,
    clock: Box<dyn Clock>,
    seed: SeedConfig,
    cache_root: Utf8PathBuf,
    // Serializes fetch/update/replay against one cache root so a save from
    // one operation cannot interleave with another's load+mutate+save.
    op_lock: Mutex<()>,
}

impl ScheduleSyncEngine {
    pub fn with_components(
        remote: Box<dyn DocumentStore>,
        cache: Arc<dyn CacheStore>,
        session: Box<dyn SessionProvider>,
        clock: Box<dyn Clock>,
        seed: SeedConfig,
        cache_root: Utf8PathBuf,
    ) -> Self {
        Self {
            remote,
            cache,
            session,
            clock,
            seed,
            cache_root,
            op_lock: Mutex::new(()),
        }
    }

    pub fn cache_root(&self) -> &Utf8PathBuf {
        &self.cache_root
    }

    /// Today's (or any date's) schedules for the logged-in collector.
    ///
    /// Replays the pending queue, ensures the daily seed, then asks the
    /// remote store. A remote failure is not an error: the cached subset
    /// for the same collector and date is returned instead, flagged as
    /// `Freshness::CacheFallback`.
    pub async fn fetch_schedules(&self, date: ServiceDate) -> Result<FetchOutcome, SyncError> {
        let collector = self.require_session()?;
        let _guard = self.op_lock.lock().await;

        let replay = self.replay_inner().await;
        let pending_remaining = match self.cache.list_pending(&self.cache_root) {
            Ok(queued) => queued.len(),
            Err(_) => 0,
        };
        let stats = FetchStats {
            replayed: replay.synced,
            pending_remaining,
        };

        // Historical dates are never re-seeded.
        if date == self.clock.today() {
            self.ensure_daily_seed(date);
        }

        let filters = [
            FieldFilter::eq("assignedCollectorId", &collector),
            FieldFilter::eq("pickupDate", date),
        ];
        match self.remote.query(SCHEDULES_COLLECTION, &filters, None).await {
            Ok(docs) => {
                let mut fetched = Vec::with_capacity(docs.len());
                for doc in docs {
                    match doc.into_schedule() {
                        Ok(schedule) => fetched.push(schedule),
                        Err(e) => tracing::warn!("skipping undecodable remote schedule: {e}"),
                    }
                }
                self.store_partition(&collector, date, &fetched);
                Ok(FetchOutcome {
                    schedules: fetched,
                    freshness: Freshness::Remote,
                    stats,
                })
            }
            Err(e) => {
                tracing::warn!("remote query failed, serving cached schedules: {e}");
                Ok(FetchOutcome {
                    schedules: self.cached_partition(&collector, date),
                    freshness: Freshness::CacheFallback,
                    stats,
                })
            }
        }
    }

    /// Single-stop lookup by area, remote first with cache fallback.
    pub async fn fetch_area_schedule(
        &self,
        area_info: &str,
        date: ServiceDate,
    ) -> Result<Option<PickupSchedule>, SyncError> {
        let _guard = self.op_lock.lock().await;
        let filters = [
            FieldFilter::eq("areaInfo", area_info),
            FieldFilter::eq("pickupDate", date),
        ];
        match self
            .remote
            .query(SCHEDULES_COLLECTION, &filters, Some(1))
            .await
        {
            Ok(docs) => Ok(docs.into_iter().next().and_then(|d| d.into_schedule().ok())),
            Err(e) => {
                tracing::warn!("area lookup failed, consulting cache: {e}");
                Ok(self
                    .load_cache()
                    .into_iter()
                    .find(|s| s.area_info == area_info && s.pickup_date == date))
            }
        }
    }

    /// Marks a stop Completed, Missed or On Hold.
    ///
    /// The remote commit is attempted once. On failure the mutation is
    /// applied to the cache anyway and queued for replay, and the call
    /// still reports success: the operator's action took effect locally.
    /// Only an id that exists nowhere locally yields `Ok(false)`.
    pub async fn update_status(
        &self,
        schedule_id: &str,
        status: ScheduleStatus,
        reason: Option<String>,
    ) -> Result<bool, SyncError> {
        self.require_session()?;
        let _guard = self.op_lock.lock().await;

        let cached = self.load_cache();
        let Some(current) = cached.iter().find(|s| s.schedule_id == schedule_id) else {
            tracing::warn!("status update for unknown schedule {schedule_id}");
            return Ok(false);
        };

        let patch = StatusPatch {
            status,
            reason,
            timestamp: status_timestamp(self.clock.now_utc()),
        };
        let committed = match self.commit_patch(schedule_id, &patch).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("remote commit for {schedule_id} failed, queueing: {e}");
                false
            }
        };

        let mut updated = current.clone();
        patch.apply_to(&mut updated);
        if let Err(e) = self.cache.upsert_schedule(&self.cache_root, &updated) {
            tracing::warn!("cache update for {schedule_id} failed: {e}");
        }

        if !committed {
            let update = PendingUpdate {
                schedule_id: schedule_id.to_string(),
                status: patch.status,
                reason: patch.reason.clone(),
                timestamp: patch.timestamp.clone(),
                queued_at: self.clock.now_utc().to_rfc3339(),
            };
            if let Err(e) = self.cache.enqueue_pending(&self.cache_root, &update) {
                tracing::warn!("failed to queue update for {schedule_id}: {e}");
            }
        }
        Ok(true)
    }

    /// Replays queued status changes against the remote store, removing
    /// exactly the ones that committed. Best effort: never raises, a
    /// failed entry stays queued for the next opportunity.
    pub async fn replay_pending(&self) -> ReplayOutcome {
        let _guard = self.op_lock.lock().await;
        self.replay_inner().await
    }

    /// Connectivity probe for diagnostic surfaces; one cheap query.
    pub async fn validate_remote(&self) -> Result<(), SyncError> {
        self.remote
            .query(SCHEDULES_COLLECTION, &[], Some(1))
            .await
            .map(|_| ())
            .map_err(|e| SyncError::Remote(e.to_string()))
    }

    async fn replay_inner(&self) -> ReplayOutcome {
        let queued = match self.cache.list_pending(&self.cache_root) {
            Ok(queued) => queued,
            Err(e) => {
                tracing::warn!("pending queue unreadable: {e}");
                return ReplayOutcome::default();
            }
        };
        if queued.is_empty() {
            return ReplayOutcome::default();
        }

        // The queue holds at most one entry per schedule, so commit order
        // across entries is immaterial and commits can run concurrently.
        let results: Vec<(String, Result<(), RemoteError>)> =
            futures::stream::iter(queued.iter())
                .map(|update| async move {
                    let result = self.commit_patch(&update.schedule_id, &update.patch()).await;
                    (update.schedule_id.clone(), result)
                })
                .buffer_unordered(4)
                .collect()
                .await;

        let mut synced = Vec::new();
        for (schedule_id, result) in results {
            match result {
                Ok(()) => synced.push(schedule_id),
                Err(e) => {
                    tracing::warn!("replay for {schedule_id} failed, keeping queued: {e}");
                }
            }
        }
        // If this removal fails the synced entries stay queued; replaying
        // them again later is a safe overwrite.
        if let Err(e) = self.cache.remove_pending(&self.cache_root, &synced) {
            tracing::warn!("failed to clear replayed updates: {e}");
        }
        let outcome = ReplayOutcome {
            attempted: queued.len(),
            synced: synced.len(),
        };
        if outcome.synced > 0 {
            tracing::debug!(
                "replayed {} of {} pending updates",
                outcome.synced,
                outcome.attempted
            );
        }
        outcome
    }

    async fn commit_patch(
        &self,
        schedule_id: &str,
        patch: &StatusPatch,
    ) -> Result<(), RemoteError> {
        let fields = serde_json::to_value(patch)?;
        self.remote
            .update(SCHEDULES_COLLECTION, schedule_id, &fields)
            .await
    }

    fn require_session(&self) -> Result<String, SyncError> {
        self.session
            .current_session_id()
            .ok_or(SyncError::NotAuthenticated)
    }

    fn load_cache(&self) -> Vec<PickupSchedule> {
        match self.cache.load_schedules(&self.cache_root) {
            Ok(schedules) => schedules,
            Err(e) => {
                tracing::warn!("cache unreadable, proceeding empty: {e}");
                Vec::new()
            }
        }
    }

    fn cached_partition(&self, collector: &str, date: ServiceDate) -> Vec<PickupSchedule> {
        self.load_cache()
            .into_iter()
            .filter(|s| s.assigned_collector_id == collector && s.pickup_date == date)
            .collect()
    }

    /// Replace only the `(collector, date)` partition of the cache; other
    /// dates and collectors stay cached.
    fn store_partition(&self, collector: &str, date: ServiceDate, fetched: &[PickupSchedule]) {
        let mut merged: Vec<PickupSchedule> = self
            .load_cache()
            .into_iter()
            .filter(|s| !(s.assigned_collector_id == collector && s.pickup_date == date))
            .collect();
        merged.extend_from_slice(fetched);
        if let Err(e) = self.cache.save_schedules(&self.cache_root, &merged) {
            tracing::warn!("cache save failed: {e}");
        }
    }

    /// Seed at most once per calendar date, detected by the explicit
    /// marker rather than record contents alone: a filtered-empty day and
    /// a never-seeded day are otherwise indistinguishable.
    fn ensure_daily_seed(&self, today: ServiceDate) {
        let seeded = match self.cache.seeded_for(&self.cache_root) {
            Ok(marker) => marker,
            Err(e) => {
                tracing::warn!("seed marker unreadable: {e}");
                None
            }
        };
        let cached = self.load_cache();
        let has_today = cached.iter().any(|s| s.pickup_date == today);
        if seeded == Some(today) && has_today {
            return;
        }

        let mut merged: Vec<PickupSchedule> = cached
            .into_iter()
            .filter(|s| s.pickup_date != today)
            .collect();
        merged.extend(self.seed.build_for_date(today));
        if let Err(e) = self.cache.save_schedules(&self.cache_root, &merged) {
            tracing::warn!("seed save failed: {e}");
            return;
        }
        if let Err(e) = self.cache.mark_seeded(&self.cache_root, today) {
            tracing::warn!("seed marker save failed: {e}");
        }
        tracing::debug!("seeded {} stops for {today}", self.seed.stops.len());
    }
}
