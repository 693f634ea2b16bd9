#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use camino::Utf8PathBuf;
use chrono::{DateTime, TimeZone, Utc};
use rounds_core::{PickupSchedule, ScheduleStatus, ServiceDate};
use rounds_persistence::RedbCacheStore;
use rounds_sync::{
    Clock, Document, DocumentStore, FieldFilter, FixedSessionProvider, RemoteError,
    ScheduleSyncEngine, SeedConfig,
};
use serde_json::Value;

#[derive(Default)]
struct ScriptedState {
    docs: HashMap<String, Value>,
    online: bool,
    fail_ids: HashSet<String>,
}

/// Scriptable stand-in for the remote document store: can be taken
/// offline wholesale or made to fail for individual documents.
#[derive(Clone)]
pub struct ScriptedRemote {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedRemote {
    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    fn new(online: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedState {
                online,
                ..Default::default()
            })),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.state.lock().unwrap().online = online;
    }

    pub fn fail_for(&self, id: &str) {
        self.state.lock().unwrap().fail_ids.insert(id.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().fail_ids.clear();
    }

    pub fn insert_schedule(&self, schedule: &PickupSchedule) {
        let fields = serde_json::to_value(schedule).unwrap();
        self.state
            .lock()
            .unwrap()
            .docs
            .insert(schedule.schedule_id.clone(), fields);
    }

    pub fn doc(&self, id: &str) -> Option<Value> {
        self.state.lock().unwrap().docs.get(id).cloned()
    }
}

#[async_trait]
impl DocumentStore for ScriptedRemote {
    async fn get(&self, _collection: &str, id: &str) -> Result<Option<Document>, RemoteError> {
        let state = self.state.lock().unwrap();
        if !state.online {
            return Err(RemoteError::Unavailable("offline".into()));
        }
        Ok(state.docs.get(id).map(|fields| Document {
            id: id.to_string(),
            fields: fields.clone(),
        }))
    }

    async fn query(
        &self,
        _collection: &str,
        filters: &[FieldFilter],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, RemoteError> {
        let state = self.state.lock().unwrap();
        if !state.online {
            return Err(RemoteError::Unavailable("offline".into()));
        }
        let mut out: Vec<Document> = state
            .docs
            .iter()
            .filter(|(_, fields)| {
                filters.iter().all(|f| {
                    fields.get(&f.field).and_then(|v| v.as_str()) == Some(f.value.as_str())
                })
            })
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(n) = limit {
            out.truncate(n);
        }
        Ok(out)
    }

    async fn set(&self, _collection: &str, id: &str, fields: &Value) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        if !state.online {
            return Err(RemoteError::Unavailable("offline".into()));
        }
        state.docs.insert(id.to_string(), fields.clone());
        Ok(())
    }

    async fn update(&self, _collection: &str, id: &str, fields: &Value) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        if !state.online {
            return Err(RemoteError::Unavailable("offline".into()));
        }
        if state.fail_ids.contains(id) {
            return Err(RemoteError::Unavailable(format!("injected failure for {id}")));
        }
        let Some(existing) = state.docs.get_mut(id) else {
            return Err(RemoteError::Unavailable(format!("no document {id}")));
        };
        if let (Value::Object(target), Value::Object(patch)) = (existing, fields) {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }
}

/// Clock whose "today" can be moved between calls to simulate rollover.
#[derive(Clone)]
pub struct SharedClock {
    today: Arc<Mutex<ServiceDate>>,
}

impl SharedClock {
    pub fn at(date: &str) -> Self {
        Self {
            today: Arc::new(Mutex::new(date.parse().unwrap())),
        }
    }

    pub fn set_today(&self, date: &str) {
        *self.today.lock().unwrap() = date.parse().unwrap();
    }
}

impl Clock for SharedClock {
    fn today(&self) -> ServiceDate {
        *self.today.lock().unwrap()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 30, 9, 0, 0).unwrap()
    }
}

pub fn utf8_root(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
}

pub fn schedule(id: &str, date: &str, collector: &str) -> PickupSchedule {
    PickupSchedule {
        schedule_id: id.to_string(),
        area_info: format!("area for {id}"),
        pickup_date: date.parse().unwrap(),
        status: ScheduleStatus::Pending,
        assigned_collector_id: collector.to_string(),
        reason: None,
        timestamp: None,
    }
}

/// Engine over a real redb cache in `root` for collector123.
pub fn engine_at(
    remote: ScriptedRemote,
    clock: SharedClock,
    root: Utf8PathBuf,
) -> ScheduleSyncEngine {
    ScheduleSyncEngine::with_components(
        Box::new(remote),
        Arc::new(RedbCacheStore::new()),
        Box::new(FixedSessionProvider::new("collector123")),
        Box::new(clock),
        SeedConfig::for_collector("collector123"),
        root,
    )
}
