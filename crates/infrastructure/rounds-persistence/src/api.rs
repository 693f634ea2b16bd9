use camino::Utf8Path;
use rounds_core::{PendingUpdate, PickupSchedule, ServiceDate};

pub const ROUNDS_REDB_FILENAME: &str = "rounds.redb";
pub const CURRENT_SCHEMA: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbState {
    Missing,
    Valid,
    Busy,
    Corrupt,
    NewerSchema { found: u32, supported: u32 },
}

/// Durable per-device cache of pickup schedules plus the pending-update
/// queue and the daily-seed marker. All operations are local persistence
/// I/O; no network calls happen behind this trait.
///
/// Missing or quarantined-corrupt databases read as empty state. Only
/// genuine I/O or backend failures surface as errors.
pub trait CacheStore: Send + Sync {
    fn validate(&self, root: &Utf8Path) -> Result<DbState, crate::StorageError>;

    fn load_schedules(&self, root: &Utf8Path) -> Result<Vec<PickupSchedule>, crate::StorageError>;

    /// Replaces the cached schedule set in one write transaction; readers
    /// never observe a partial write.
    fn save_schedules(
        &self,
        root: &Utf8Path,
        schedules: &[PickupSchedule],
    ) -> Result<(), crate::StorageError>;

    fn upsert_schedule(
        &self,
        root: &Utf8Path,
        schedule: &PickupSchedule,
    ) -> Result<(), crate::StorageError>;

    fn seeded_for(&self, root: &Utf8Path) -> Result<Option<ServiceDate>, crate::StorageError>;

    fn mark_seeded(&self, root: &Utf8Path, date: ServiceDate) -> Result<(), crate::StorageError>;

    /// Queues a status-change intent. An existing entry for the same
    /// `schedule_id` has its payload replaced in place, keeping its queue
    /// position; the queue never holds two entries for one schedule.
    fn enqueue_pending(
        &self,
        root: &Utf8Path,
        update: &PendingUpdate,
    ) -> Result<(), crate::StorageError>;

    /// Oldest first.
    fn list_pending(&self, root: &Utf8Path) -> Result<Vec<PendingUpdate>, crate::StorageError>;

    /// Removes exactly the entries whose `schedule_id` is listed,
    /// preserving the order of the remainder.
    fn remove_pending(
        &self,
        root: &Utf8Path,
        schedule_ids: &[String],
    ) -> Result<(), crate::StorageError>;
}
