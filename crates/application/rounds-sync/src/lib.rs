use std::sync::Arc;

use camino::Utf8PathBuf;
use rounds_core::PickupSchedule;

pub mod clock;
pub mod engine;
pub mod remote;
pub mod seed;
pub mod session;

pub use clock::{Clock, SystemClock};
pub use engine::ScheduleSyncEngine;
pub use remote::{
    Document, DocumentStore, FieldFilter, HttpDocumentStore, RemoteError, SCHEDULES_COLLECTION,
};
pub use seed::{SeedConfig, SeedStop};
pub use session::{FixedSessionProvider, SessionProvider};

/// High-level error type for engine operations.
///
/// Degraded-network conditions never surface here; reads fall back to the
/// cache and writes fall back to local-commit-plus-queue. A missing
/// session is the one condition that fails an operation outright.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("not logged in: no active collector session")]
    NotAuthenticated,
    #[error("remote error: {0}")]
    Remote(String),
}

/// Whether a fetch answered from the remote store or degraded to the
/// local cache, so the layer above can tell "confirmed no schedules"
/// apart from "could not verify".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The remote store answered; the result is authoritative, including
    /// when it is empty.
    Remote,
    /// The remote store was unreachable; the result is whatever the local
    /// cache held, possibly nothing.
    CacheFallback,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub replayed: usize,
    pub pending_remaining: usize,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub schedules: Vec<PickupSchedule>,
    pub freshness: Freshness,
    pub stats: FetchStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub attempted: usize,
    pub synced: usize,
}

/// Convenience constructor wiring the HTTP document store, the redb cache
/// and a fixed collector session.
pub fn default_engine(
    client: reqwest::Client,
    base_url: &str,
    cache_root: Utf8PathBuf,
    collector_id: &str,
) -> Result<ScheduleSyncEngine, SyncError> {
    let remote =
        HttpDocumentStore::new(client, base_url).map_err(|e| SyncError::Remote(e.to_string()))?;
    Ok(ScheduleSyncEngine::with_components(
        Box::new(remote),
        Arc::new(rounds_persistence::RedbCacheStore::new()),
        Box::new(FixedSessionProvider::new(collector_id)),
        Box::new(SystemClock),
        SeedConfig::for_collector(collector_id),
        cache_root,
    ))
}
