use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use rounds_core::{PendingUpdate, PickupSchedule, ServiceDate};

use crate::api::{CacheStore, DbState, CURRENT_SCHEMA, ROUNDS_REDB_FILENAME};
use crate::codec::{decode_pending, decode_schedule, encode_pending, encode_schedule};
use crate::maintenance::quarantine_corrupt_file;
use crate::StorageError;

const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
const SCHEDULES: TableDefinition<&str, &[u8]> = TableDefinition::new("schedules");
const PENDING: TableDefinition<u64, &[u8]> = TableDefinition::new("pending");

const META_FORMAT_KEY: &str = "format";
const META_FORMAT_VALUE: &str = "rounds-redb";
const META_SCHEMA_VERSION: &str = "schema_version";
const META_CREATED_AT: &str = "created_at";
const META_SEEDED_FOR: &str = "seeded_for";

#[derive(Debug, Default, Clone)]
pub struct RedbCacheStore;

impl RedbCacheStore {
    pub fn new() -> Self {
        Self
    }

    pub fn path_for_root(root: &Utf8Path) -> Utf8PathBuf {
        root.join(ROUNDS_REDB_FILENAME)
    }

    fn is_corrupt_open_error(err: &redb::DatabaseError) -> bool {
        match err {
            redb::DatabaseError::Storage(storage) => match storage {
                redb::StorageError::Corrupted(_) => true,
                redb::StorageError::Io(ioe) => matches!(
                    ioe.kind(),
                    std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof
                ),
                _ => false,
            },
            _ => false,
        }
    }

    fn db_cache() -> &'static Mutex<HashMap<Utf8PathBuf, Arc<Database>>> {
        static CACHE: OnceLock<Mutex<HashMap<Utf8PathBuf, Arc<Database>>>> = OnceLock::new();
        CACHE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    fn open_or_create(&self, root: &Utf8Path) -> Result<Arc<Database>, StorageError> {
        let path = Self::path_for_root(root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cache = Self::db_cache().lock().expect("db cache lock poisoned");
        if let Some(existing) = cache.get(&path) {
            if !path.exists() {
                cache.remove(&path);
            } else {
                return Ok(existing.clone());
            }
        }

        let db = if path.exists() {
            match Database::open(path.as_std_path()) {
                Ok(db) => db,
                Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                    return Err(StorageError::DatabaseAlreadyOpen);
                }
                Err(e) if Self::is_corrupt_open_error(&e) => {
                    let _ = quarantine_corrupt_file(&path);
                    return Err(StorageError::Corrupt);
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            Database::create(path.as_std_path())?
        };

        if let Err(e) = self.ensure_schema(&db) {
            drop(db);
            if matches!(e, StorageError::Corrupt) {
                let _ = quarantine_corrupt_file(&path);
            }
            return Err(e);
        }
        let db = Arc::new(db);
        cache.insert(path, db.clone());
        Ok(db)
    }

    fn open_existing(&self, root: &Utf8Path) -> Result<Arc<Database>, StorageError> {
        let path = Self::path_for_root(root);
        if !path.exists() {
            return Err(StorageError::Missing);
        }

        let mut cache = Self::db_cache().lock().expect("db cache lock poisoned");
        if let Some(existing) = cache.get(&path) {
            if !path.exists() {
                cache.remove(&path);
            } else {
                return Ok(existing.clone());
            }
        }

        let db = match Database::open(path.as_std_path()) {
            Ok(db) => db,
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                return Err(StorageError::DatabaseAlreadyOpen);
            }
            Err(e) if Self::is_corrupt_open_error(&e) => {
                let _ = quarantine_corrupt_file(&path);
                return Err(StorageError::Corrupt);
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.ensure_schema(&db) {
            drop(db);
            if matches!(e, StorageError::Corrupt) {
                let _ = quarantine_corrupt_file(&path);
            }
            return Err(e);
        }
        let db = Arc::new(db);
        cache.insert(path, db.clone());
        Ok(db)
    }

    fn ensure_schema(&self, db: &Database) -> Result<(), StorageError> {
        // Create tables and required meta keys on first open.
        let write_tx = db.begin_write()?;
        {
            let mut meta = write_tx.open_table(META)?;
            let format: Option<String> = meta.get(META_FORMAT_KEY)?.map(|g| g.value().to_string());
            if format.is_none() {
                let schema_version = CURRENT_SCHEMA.to_string();
                let created_at = Utc::now().to_rfc3339();
                meta.insert(META_FORMAT_KEY, META_FORMAT_VALUE)?;
                meta.insert(META_SCHEMA_VERSION, schema_version.as_str())?;
                meta.insert(META_CREATED_AT, created_at.as_str())?;
            } else if format.as_deref() != Some(META_FORMAT_VALUE) {
                return Err(StorageError::Corrupt);
            }
        }
        let _ = write_tx.open_table(SCHEDULES)?;
        let _ = write_tx.open_table(PENDING)?;
        write_tx.commit()?;

        let read_tx = db.begin_read()?;
        let meta = read_tx.open_table(META)?;
        let schema_version = meta
            .get(META_SCHEMA_VERSION)?
            .and_then(|g| g.value().parse::<u32>().ok())
            .unwrap_or(0);
        if schema_version == 0 {
            return Err(StorageError::Corrupt);
        }
        if schema_version > CURRENT_SCHEMA {
            return Err(StorageError::NewerSchema {
                found: schema_version,
                supported: CURRENT_SCHEMA,
            });
        }
        if schema_version != CURRENT_SCHEMA {
            return Err(StorageError::Corrupt);
        }
        Ok(())
    }
}

impl CacheStore for RedbCacheStore {
    fn validate(&self, root: &Utf8Path) -> Result<DbState, StorageError> {
        let path = Self::path_for_root(root);
        if !path.exists() {
            return Ok(DbState::Missing);
        }
        {
            let mut cache = Self::db_cache().lock().expect("db cache lock poisoned");
            if cache.contains_key(&path) {
                if !path.exists() {
                    cache.remove(&path);
                    return Ok(DbState::Missing);
                }
                return Ok(DbState::Valid);
            }
        }

        match Database::open(path.as_std_path()) {
            Ok(db) => match self.ensure_schema(&db) {
                Ok(()) => Ok(DbState::Valid),
                Err(StorageError::NewerSchema { found, supported }) => {
                    Ok(DbState::NewerSchema { found, supported })
                }
                Err(StorageError::DatabaseAlreadyOpen) => Ok(DbState::Busy),
                Err(StorageError::Corrupt) => {
                    drop(db);
                    let _ = quarantine_corrupt_file(&path);
                    Ok(DbState::Corrupt)
                }
                Err(e) => Err(e),
            },
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => Ok(DbState::Busy),
            Err(e) if Self::is_corrupt_open_error(&e) => {
                let _ = quarantine_corrupt_file(&path);
                Ok(DbState::Corrupt)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load_schedules(&self, root: &Utf8Path) -> Result<Vec<PickupSchedule>, StorageError> {
        let db = match self.open_existing(root) {
            Ok(db) => db,
            // Absent and quarantined-corrupt caches read as empty.
            Err(StorageError::Missing) | Err(StorageError::Corrupt) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let read_tx = db.begin_read()?;
        let table = read_tx.open_table(SCHEDULES)?;
        let mut out = Vec::new();
        for row in table.iter()? {
            let (key, value) = row?;
            match decode_schedule(value.value()) {
                Ok(schedule) => out.push(schedule),
                Err(e) => {
                    tracing::warn!("dropping undecodable cached schedule {}: {e}", key.value());
                }
            }
        }
        Ok(out)
    }

    fn save_schedules(
        &self,
        root: &Utf8Path,
        schedules: &[PickupSchedule],
    ) -> Result<(), StorageError> {
        let db = self.open_or_create(root)?;
        let write_tx = db.begin_write()?;
        write_tx.delete_table(SCHEDULES)?;
        {
            let mut table = write_tx.open_table(SCHEDULES)?;
            for schedule in schedules {
                let value = encode_schedule(schedule)?;
                table.insert(schedule.schedule_id.as_str(), value.as_slice())?;
            }
        }
        write_tx.commit()?;
        Ok(())
    }

    fn upsert_schedule(
        &self,
        root: &Utf8Path,
        schedule: &PickupSchedule,
    ) -> Result<(), StorageError> {
        let db = self.open_or_create(root)?;
        let write_tx = db.begin_write()?;
        {
            let mut table = write_tx.open_table(SCHEDULES)?;
            let value = encode_schedule(schedule)?;
            table.insert(schedule.schedule_id.as_str(), value.as_slice())?;
        }
        write_tx.commit()?;
        Ok(())
    }

    fn seeded_for(&self, root: &Utf8Path) -> Result<Option<ServiceDate>, StorageError> {
        let db = match self.open_existing(root) {
            Ok(db) => db,
            Err(StorageError::Missing) | Err(StorageError::Corrupt) => return Ok(None),
            Err(e) => return Err(e),
        };
        let read_tx = db.begin_read()?;
        let meta = read_tx.open_table(META)?;
        let marker = meta.get(META_SEEDED_FOR)?.map(|g| g.value().to_string());
        Ok(marker.and_then(|s| s.parse().ok()))
    }

    fn mark_seeded(&self, root: &Utf8Path, date: ServiceDate) -> Result<(), StorageError> {
        let db = self.open_or_create(root)?;
        let write_tx = db.begin_write()?;
        {
            let mut meta = write_tx.open_table(META)?;
            let marker = date.to_string();
            meta.insert(META_SEEDED_FOR, marker.as_str())?;
        }
        write_tx.commit()?;
        Ok(())
    }

    fn enqueue_pending(&self, root: &Utf8Path, update: &PendingUpdate) -> Result<(), StorageError> {
        let db = self.open_or_create(root)?;
        let write_tx = db.begin_write()?;
        {
            let mut table = write_tx.open_table(PENDING)?;
            // Collapse at enqueue: one entry per schedule, latest payload
            // wins, original queue position kept.
            let mut slot = None;
            let mut next_seq = 0u64;
            for row in table.iter()? {
                let (key, value) = row?;
                let seq = key.value();
                next_seq = seq + 1;
                if let Ok(existing) = decode_pending(value.value()) {
                    if existing.schedule_id == update.schedule_id {
                        slot = Some(seq);
                    }
                }
            }
            let value = encode_pending(update)?;
            table.insert(slot.unwrap_or(next_seq), value.as_slice())?;
        }
        write_tx.commit()?;
        Ok(())
    }

    fn list_pending(&self, root: &Utf8Path) -> Result<Vec<PendingUpdate>, StorageError> {
        let db = match self.open_existing(root) {
            Ok(db) => db,
            Err(StorageError::Missing) | Err(StorageError::Corrupt) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let read_tx = db.begin_read()?;
        let table = read_tx.open_table(PENDING)?;
        let mut out = Vec::new();
        for row in table.iter()? {
            let (key, value) = row?;
            match decode_pending(value.value()) {
                Ok(update) => out.push(update),
                Err(e) => {
                    tracing::warn!("dropping undecodable pending update #{}: {e}", key.value());
                }
            }
        }
        Ok(out)
    }

    fn remove_pending(
        &self,
        root: &Utf8Path,
        schedule_ids: &[String],
    ) -> Result<(), StorageError> {
        if schedule_ids.is_empty() {
            return Ok(());
        }
        let db = match self.open_existing(root) {
            Ok(db) => db,
            Err(StorageError::Missing) | Err(StorageError::Corrupt) => return Ok(()),
            Err(e) => return Err(e),
        };
        let wanted: HashSet<&str> = schedule_ids.iter().map(|s| s.as_str()).collect();
        let write_tx = db.begin_write()?;
        {
            let mut table = write_tx.open_table(PENDING)?;
            let mut doomed = Vec::new();
            for row in table.iter()? {
                let (key, value) = row?;
                if let Ok(update) = decode_pending(value.value()) {
                    if wanted.contains(update.schedule_id.as_str()) {
                        doomed.push(key.value());
                    }
                }
            }
            for seq in doomed {
                table.remove(seq)?;
            }
        }
        write_tx.commit()?;
        Ok(())
    }
}
