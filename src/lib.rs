//! Offline-tolerant state and sync core for the Rentala property, tenant
//! and payment managers.
//!
//! Each entity type gets an [`EntityStore`] that owns its list, talks to the
//! REST API through a [`SyncClient`] and falls back to a [`SnapshotCache`]
//! when the API is unreachable. A [`FilterView`] turns the list into pages
//! for whatever presentation layer sits on top.

pub mod cache;
pub mod config;
pub mod db;
pub mod entity;
mod error;
pub mod id;
pub mod logging;
pub mod stats;
pub mod store;
pub mod sync;
pub mod time;
pub mod view;

pub use cache::{CacheSnapshot, CacheStore, MemoryCache, SnapshotCache, SqliteCache};
pub use config::Config;
pub use entity::{Choice, Entity, EntityFields};
pub use error::{
    AppError, AppResult, FieldIssue, StoreError, ValidationError, STORE_NOT_FOUND,
    VALIDATION_INVALID_FIELDS,
};
pub use id::EntityId;
pub use store::{EntityStore, LoadStatus, LoadTicket, Loaded, Mutation, StoreOptions, SyncState};
pub use sync::{HttpSyncClient, OfflineClient, SyncClient, SyncError};
pub use view::{FilterView, Page, StatusFilter};
