//! In-memory collection for one entity type with optimistic remote sync.
//!
//! The store owns the ordered list and an id index over it. Mutations land in
//! memory first; the remote outcome is reported alongside the entity rather
//! than as an error, since the local change stands either way. Only caller
//! mistakes (invalid fields, unknown ids) are returned as [`StoreError`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::SnapshotCache;
use crate::entity::{Entity, EntityFields};
use crate::error::StoreError;
use crate::id::EntityId;
use crate::sync::{SyncClient, SyncError};
use crate::time::{Clock, SystemClock};
use crate::AppResult;

pub const DEFAULT_CACHE_TTL_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Snapshots older than this are discarded instead of restored.
    pub cache_ttl_ms: i64,
    /// Offer example records when a first load finds neither API nor cache.
    pub seed_examples: bool,
    /// Rewrite the cache snapshot after every mutation.
    pub snapshot_on_mutation: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            seed_examples: false,
            snapshot_on_mutation: false,
        }
    }
}

/// Store version captured when a fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    version: u64,
}

impl LoadTicket {
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// How a load resolved. Every variant except `Live` carries the fetch
/// failure that caused the fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    Live,
    /// Restored from a cache snapshot of the given age.
    Cached { age_ms: i64, error: SyncError },
    /// The list already in memory was kept.
    Retained { error: SyncError },
    /// First run with nothing to restore; example records were installed.
    Seeded { error: SyncError },
    Empty { error: SyncError },
    /// A mutation happened while the fetch was in flight; the result was
    /// dropped and the list left as is.
    Superseded,
}

impl LoadStatus {
    /// Usable data, but not fresh from the API.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            Self::Cached { .. } | Self::Retained { .. } | Self::Seeded { .. }
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Empty { .. } | Self::Seeded { .. })
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Cached { error, .. }
            | Self::Retained { error }
            | Self::Seeded { error }
            | Self::Empty { error } => Some(error),
            Self::Live | Self::Superseded => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loaded<F: EntityFields> {
    pub entities: Vec<Entity<F>>,
    pub status: LoadStatus,
    /// Ids deleted locally whose remote delete failed and which the server
    /// still returned.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resurrected: Vec<EntityId>,
    /// Records with unconfirmed local changes that a live load replaced, as
    /// they were before the load. Local-only creates are among them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub discarded: Vec<Entity<F>>,
}

/// Remote outcome of a mutation that has already been applied locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum SyncState {
    Synced,
    /// The record only exists locally, so there was nothing to send.
    Deferred,
    Failed(SyncError),
}

impl SyncState {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Mutation<F: EntityFields> {
    pub entity: Entity<F>,
    pub sync: SyncState,
}

pub struct EntityStore<F: EntityFields> {
    entities: Vec<Entity<F>>,
    index: HashMap<EntityId, usize>,
    client: Arc<dyn SyncClient<F>>,
    cache: SnapshotCache,
    clock: Arc<dyn Clock>,
    options: StoreOptions,
    version: u64,
    initialized: bool,
    pending_deletes: HashSet<EntityId>,
}

impl<F: EntityFields> EntityStore<F> {
    pub fn new(client: Arc<dyn SyncClient<F>>, cache: SnapshotCache) -> Self {
        Self {
            entities: Vec::new(),
            index: HashMap::new(),
            client,
            cache,
            clock: Arc::new(SystemClock),
            options: StoreOptions::default(),
            version: 0,
            initialized: false,
            pending_deletes: HashSet::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn kind(&self) -> &'static str {
        F::KIND
    }

    pub fn entities(&self) -> &[Entity<F>] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Records with a local change the API has not confirmed.
    pub fn unsynced(&self) -> Vec<&Entity<F>> {
        self.entities.iter().filter(|e| e.unsynced).collect()
    }

    pub fn by_id(&self, id: &EntityId) -> Option<&Entity<F>> {
        self.index.get(id).map(|&idx| &self.entities[idx])
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Shared handle for callers that fetch outside the store and hand the
    /// result to [`finish_load`](Self::finish_load).
    pub fn client(&self) -> Arc<dyn SyncClient<F>> {
        Arc::clone(&self.client)
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub async fn load(&mut self) -> Loaded<F> {
        let ticket = self.begin_load();
        let result = self.client.fetch_all().await;
        self.finish_load(ticket, result).await
    }

    pub fn begin_load(&self) -> LoadTicket {
        LoadTicket {
            version: self.version,
        }
    }

    /// Applies a fetch result started at `ticket`, unless the store changed
    /// in the meantime.
    pub async fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Entity<F>>, SyncError>,
    ) -> Loaded<F> {
        if ticket.version != self.version {
            info!(
                target: "rentala",
                event = "load_superseded",
                kind = F::KIND,
                ticket_version = ticket.version,
                store_version = self.version
            );
            return self.loaded(LoadStatus::Superseded);
        }

        match result {
            Ok(fetched) => self.apply_live(fetched).await,
            Err(error) => self.recover(error).await,
        }
    }

    async fn apply_live(&mut self, fetched: Vec<Entity<F>>) -> Loaded<F> {
        let now = self.clock.now_ms();
        let discarded: Vec<Entity<F>> = self
            .entities
            .iter()
            .filter(|e| e.unsynced)
            .cloned()
            .collect();
        if !discarded.is_empty() {
            let ids: Vec<&EntityId> = discarded.iter().map(|e| &e.id).collect();
            warn!(
                target: "rentala",
                event = "load_discarded_unsynced",
                kind = F::KIND,
                count = discarded.len(),
                local = discarded.iter().filter(|e| e.id.is_local()).count(),
                ids = ?ids
            );
        }

        self.replace_all(fetched, now);

        let mut resurrected: Vec<EntityId> = self
            .pending_deletes
            .drain()
            .filter(|id| self.index.contains_key(id))
            .collect();
        resurrected.sort();
        if !resurrected.is_empty() {
            warn!(
                target: "rentala",
                event = "load_resurrected",
                kind = F::KIND,
                ids = ?resurrected
            );
        }

        self.initialized = true;
        self.bump();
        if let Err(err) = self.persist_snapshot().await {
            warn!(target: "rentala", event = "cache_write_failed", kind = F::KIND, error = %err);
        }
        self.mark_initialized(now).await;
        info!(
            target: "rentala",
            event = "load_live",
            kind = F::KIND,
            count = self.entities.len()
        );
        Loaded {
            resurrected,
            discarded,
            ..self.loaded(LoadStatus::Live)
        }
    }

    async fn recover(&mut self, error: SyncError) -> Loaded<F> {
        warn!(
            target: "rentala",
            event = "load_failed",
            kind = F::KIND,
            error_kind = error.kind(),
            error = %error
        );

        if self.initialized {
            return self.loaded(LoadStatus::Retained { error });
        }

        let now = self.clock.now_ms();
        match self
            .cache
            .read_fresh::<Entity<F>>(F::KIND, now, self.options.cache_ttl_ms)
            .await
        {
            Ok(Some(snapshot)) => {
                let age_ms = snapshot.age_ms(now);
                self.replace_all(snapshot.data, now);
                self.initialized = true;
                self.bump();
                info!(
                    target: "rentala",
                    event = "load_cached",
                    kind = F::KIND,
                    count = self.entities.len(),
                    age_ms
                );
                return self.loaded(LoadStatus::Cached { age_ms, error });
            }
            Ok(None) => {}
            Err(err) => {
                warn!(target: "rentala", event = "cache_read_failed", kind = F::KIND, error = %err);
            }
        }

        if self.options.seed_examples && !self.seen_before().await {
            let seeded = F::examples()
                .into_iter()
                .map(|fields| Entity::new(EntityId::local(), fields, now))
                .collect();
            self.replace_all(seeded, now);
            self.initialized = true;
            self.bump();
            if let Err(err) = self.persist_snapshot().await {
                warn!(target: "rentala", event = "cache_write_failed", kind = F::KIND, error = %err);
            }
            self.mark_initialized(now).await;
            info!(
                target: "rentala",
                event = "load_seeded",
                kind = F::KIND,
                count = self.entities.len()
            );
            return self.loaded(LoadStatus::Seeded { error });
        }

        self.replace_all(Vec::new(), now);
        self.loaded(LoadStatus::Empty { error })
    }

    async fn seen_before(&self) -> bool {
        match self.cache.is_initialized(F::KIND).await {
            Ok(seen) => seen,
            Err(err) => {
                warn!(target: "rentala", event = "cache_read_failed", kind = F::KIND, error = %err);
                true
            }
        }
    }

    async fn mark_initialized(&self, now: i64) {
        if let Err(err) = self.cache.mark_initialized(F::KIND, now).await {
            warn!(target: "rentala", event = "cache_write_failed", kind = F::KIND, error = %err);
        }
    }

    pub async fn create(&mut self, fields: F) -> Result<Mutation<F>, StoreError> {
        fields.validate()?;
        let now = self.clock.now_ms();

        let (entity, sync) = match self.client.create(&fields).await {
            Ok(mut created) => {
                created.normalize_timestamps(now);
                created.unsynced = false;
                (created, SyncState::Synced)
            }
            Err(error) => {
                warn!(
                    target: "rentala",
                    event = "create_sync_failed",
                    kind = F::KIND,
                    error_kind = error.kind(),
                    error = %error
                );
                (Entity::local(fields, now), SyncState::Failed(error))
            }
        };

        self.upsert(entity.clone());
        self.after_mutation();
        self.refresh_snapshot().await;
        info!(
            target: "rentala",
            event = "entity_created",
            kind = F::KIND,
            id = %entity.id,
            synced = sync.is_synced()
        );
        Ok(Mutation { entity, sync })
    }

    pub async fn update(&mut self, id: &EntityId, patch: F::Patch) -> Result<Mutation<F>, StoreError> {
        let idx = self.position(id)?;
        let current = &self.entities[idx];
        let mut merged = current.clone();
        merged.fields.apply_patch(&patch);
        merged.fields.validate()?;

        let now = self.clock.now_ms();
        merged.updated_at = now.max(current.updated_at + 1);
        self.entities[idx] = merged.clone();
        self.after_mutation();

        let sync = if id.is_local() {
            self.entities[idx].unsynced = true;
            debug!(target: "rentala", event = "update_deferred", kind = F::KIND, id = %id);
            SyncState::Deferred
        } else {
            match self.client.update(id, &patch).await {
                Ok(mut remote) => {
                    remote.id = merged.id.clone();
                    if remote.created_at <= 0 {
                        remote.created_at = merged.created_at;
                    }
                    remote.updated_at = remote.updated_at.max(merged.updated_at);
                    remote.unsynced = false;
                    self.entities[idx] = remote;
                    SyncState::Synced
                }
                Err(error) => {
                    warn!(
                        target: "rentala",
                        event = "update_sync_failed",
                        kind = F::KIND,
                        id = %id,
                        error_kind = error.kind(),
                        error = %error
                    );
                    self.entities[idx].unsynced = true;
                    SyncState::Failed(error)
                }
            }
        };

        self.refresh_snapshot().await;
        let entity = self.entities[idx].clone();
        info!(
            target: "rentala",
            event = "entity_updated",
            kind = F::KIND,
            id = %id,
            synced = sync.is_synced()
        );
        Ok(Mutation { entity, sync })
    }

    pub async fn delete(&mut self, id: &EntityId) -> Result<Mutation<F>, StoreError> {
        let idx = self.position(id)?;
        let removed = self.entities.remove(idx);
        self.reindex();
        self.after_mutation();

        let sync = if id.is_local() {
            debug!(target: "rentala", event = "delete_deferred", kind = F::KIND, id = %id);
            SyncState::Deferred
        } else {
            match self.client.delete(id).await {
                Ok(()) => SyncState::Synced,
                Err(error) => {
                    warn!(
                        target: "rentala",
                        event = "delete_needs_reconciliation",
                        kind = F::KIND,
                        id = %id,
                        error_kind = error.kind(),
                        error = %error
                    );
                    self.pending_deletes.insert(id.clone());
                    SyncState::Failed(error)
                }
            }
        };

        self.refresh_snapshot().await;
        info!(
            target: "rentala",
            event = "entity_deleted",
            kind = F::KIND,
            id = %id,
            synced = sync.is_synced()
        );
        Ok(Mutation {
            entity: removed,
            sync,
        })
    }

    /// Writes the current list as the cache snapshot for this kind.
    pub async fn persist_snapshot(&self) -> AppResult<()> {
        self.cache
            .write(F::KIND, &self.entities, self.clock.now_ms())
            .await
    }

    fn position(&self, id: &EntityId) -> Result<usize, StoreError> {
        self.index.get(id).copied().ok_or_else(|| StoreError::NotFound {
            kind: F::KIND,
            id: id.clone(),
        })
    }

    fn upsert(&mut self, entity: Entity<F>) {
        match self.index.get(&entity.id) {
            Some(&idx) => {
                warn!(target: "rentala", event = "duplicate_id_replaced", kind = F::KIND, id = %entity.id);
                self.entities[idx] = entity;
            }
            None => {
                self.index.insert(entity.id.clone(), self.entities.len());
                self.entities.push(entity);
            }
        }
    }

    /// Installs a new list, normalizing timestamps and keeping the first
    /// record for any repeated id.
    fn replace_all(&mut self, entities: Vec<Entity<F>>, now: i64) {
        self.entities.clear();
        self.index.clear();
        for mut entity in entities {
            if self.index.contains_key(&entity.id) {
                warn!(target: "rentala", event = "duplicate_id_dropped", kind = F::KIND, id = %entity.id);
                continue;
            }
            entity.normalize_timestamps(now);
            self.index.insert(entity.id.clone(), self.entities.len());
            self.entities.push(entity);
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .entities
            .iter()
            .enumerate()
            .map(|(idx, entity)| (entity.id.clone(), idx))
            .collect();
    }

    fn bump(&mut self) {
        self.version += 1;
    }

    fn after_mutation(&mut self) {
        self.bump();
        self.initialized = true;
    }

    async fn refresh_snapshot(&self) {
        if !self.options.snapshot_on_mutation {
            return;
        }
        if let Err(err) = self.persist_snapshot().await {
            warn!(target: "rentala", event = "cache_write_failed", kind = F::KIND, error = %err);
        }
    }

    fn loaded(&self, status: LoadStatus) -> Loaded<F> {
        Loaded {
            entities: self.entities.clone(),
            status,
            resurrected: Vec::new(),
            discarded: Vec::new(),
        }
    }
}
