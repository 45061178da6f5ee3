#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rentala_lib::time::{Clock, ManualClock};
use rentala_lib::{Entity, EntityFields, EntityId, EntityStore, SnapshotCache, SyncClient, SyncError};

pub const T0: i64 = 1_709_251_200_000; // 2024-03-01T00:00:00Z
pub const MINUTE: i64 = 60_000;
pub const HOUR: i64 = 60 * MINUTE;

/// In-process stand-in for the REST API. Assigns numeric ids like the
/// Express backend and can be switched into a failing state.
pub struct FakeApi<F: EntityFields> {
    remote: Mutex<Vec<Entity<F>>>,
    failing: AtomicBool,
    next_id: AtomicU64,
    clock: Arc<ManualClock>,
    calls: Mutex<Vec<String>>,
}

impl<F: EntityFields> FakeApi<F> {
    pub fn new(clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            remote: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            clock,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn seed(&self, fields: F) -> EntityId {
        let id = EntityId::from(self.next_id.fetch_add(1, Ordering::SeqCst));
        let entity = Entity::new(id.clone(), fields, self.clock.now_ms());
        self.remote.lock().unwrap().push(entity);
        id
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn remote(&self) -> Vec<Entity<F>> {
        self.remote.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), SyncError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            Err(SyncError::network("connection refused"))
        } else {
            Ok(())
        }
    }

    fn not_found(id: &EntityId) -> SyncError {
        SyncError::Server {
            status: 404,
            body: format!(r#"{{"error":"{id} not found"}}"#),
        }
    }
}

#[async_trait]
impl<F: EntityFields> SyncClient<F> for FakeApi<F> {
    async fn fetch_all(&self) -> Result<Vec<Entity<F>>, SyncError> {
        self.record("fetch_all".into())?;
        Ok(self.remote())
    }

    async fn create(&self, fields: &F) -> Result<Entity<F>, SyncError> {
        self.record("create".into())?;
        let id = self.seed(fields.clone());
        let remote = self.remote.lock().unwrap();
        Ok(remote.iter().find(|e| e.id == id).cloned().unwrap())
    }

    async fn update(&self, id: &EntityId, patch: &F::Patch) -> Result<Entity<F>, SyncError> {
        self.record(format!("update {id}"))?;
        let mut remote = self.remote.lock().unwrap();
        let entity = remote
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        entity.fields.apply_patch(patch);
        entity.updated_at = self.clock.now_ms();
        Ok(entity.clone())
    }

    async fn delete(&self, id: &EntityId) -> Result<(), SyncError> {
        self.record(format!("delete {id}"))?;
        let mut remote = self.remote.lock().unwrap();
        let before = remote.len();
        remote.retain(|e| &e.id != id);
        if remote.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(T0))
}

pub fn store_with<F: EntityFields>(
    api: &Arc<FakeApi<F>>,
    cache: &SnapshotCache,
    clock: &Arc<ManualClock>,
) -> EntityStore<F> {
    EntityStore::new(api.clone(), cache.clone()).with_clock(clock.clone())
}
