//! Offline snapshots of each store's list.
//!
//! [`CacheStore`] is a plain string key-value seam with an in-memory and a
//! SQLite implementation. [`SnapshotCache`] layers key naming, the snapshot
//! envelope and expiry on top of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{time, AppError, AppResult};

/// Envelope format written by this crate. Snapshots carrying any other
/// version are discarded on read.
pub const SNAPSHOT_VERSION: &str = "1.0";
pub const DEFAULT_CACHE_PREFIX: &str = "rentala_cache";

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
    async fn remove(&self, key: &str) -> AppResult<()>;
}

fn lock_poisoned() -> AppError {
    AppError::new("CACHE/LOCK_POISONED", "In-memory cache lock was poisoned")
}

#[derive(Default)]
pub struct MemoryCache {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .map_err(|_| lock_poisoned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut guard = self.data.lock().map_err(|_| lock_poisoned())?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let mut guard = self.data.lock().map_err(|_| lock_poisoned())?;
        guard.remove(key);
        Ok(())
    }
}

/// Durable cache in a `cache_entries` table.
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub async fn new(pool: SqlitePool) -> AppResult<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "cache_schema"))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CacheStore for SqliteCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM cache_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| AppError::from(err).with_context("key", key))?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO cache_entries (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(time::now_ms())
        .execute(&self.pool)
        .await
        .map_err(|err| AppError::from(err).with_context("key", key))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|err| AppError::from(err).with_context("key", key))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot<T> {
    pub data: Vec<T>,
    pub timestamp: i64,
    pub version: String,
}

impl<T> CacheSnapshot<T> {
    pub fn age_ms(&self, now: i64) -> i64 {
        (now - self.timestamp).max(0)
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a, T> {
    data: &'a [T],
    timestamp: i64,
    version: &'static str,
}

#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<dyn CacheStore>,
    prefix: String,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn CacheStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()), DEFAULT_CACHE_PREFIX)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key(&self, kind: &str) -> String {
        format!("{}_{}", self.prefix, kind)
    }

    fn marker_key(&self, kind: &str) -> String {
        format!("{}_{}_initialized", self.prefix, kind)
    }

    pub async fn write<T: Serialize>(&self, kind: &str, data: &[T], now: i64) -> AppResult<()> {
        let payload = serde_json::to_string(&SnapshotRef {
            data,
            timestamp: now,
            version: SNAPSHOT_VERSION,
        })?;
        self.store.set(&self.key(kind), &payload).await
    }

    /// Returns the snapshot for `kind` unless it is missing, unreadable,
    /// from another format version, or older than `ttl_ms`. Anything
    /// unusable is removed so the next read is a clean miss.
    pub async fn read_fresh<T: DeserializeOwned>(
        &self,
        kind: &str,
        now: i64,
        ttl_ms: i64,
    ) -> AppResult<Option<CacheSnapshot<T>>> {
        let key = self.key(kind);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let snapshot: CacheSnapshot<T> = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    target: "rentala",
                    event = "cache_snapshot_corrupt",
                    kind,
                    error = %err
                );
                self.store.remove(&key).await?;
                return Ok(None);
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                target: "rentala",
                event = "cache_snapshot_version_mismatch",
                kind,
                version = %snapshot.version
            );
            self.store.remove(&key).await?;
            return Ok(None);
        }

        if now - snapshot.timestamp > ttl_ms {
            info!(
                target: "rentala",
                event = "cache_snapshot_expired",
                kind,
                age_ms = snapshot.age_ms(now),
                ttl_ms
            );
            self.store.remove(&key).await?;
            return Ok(None);
        }

        Ok(Some(snapshot))
    }

    pub async fn clear(&self, kind: &str) -> AppResult<()> {
        self.store.remove(&self.key(kind)).await
    }

    /// Whether `kind` has ever had data, live or seeded.
    pub async fn is_initialized(&self, kind: &str) -> AppResult<bool> {
        Ok(self.store.get(&self.marker_key(kind)).await?.is_some())
    }

    pub async fn mark_initialized(&self, kind: &str, now: i64) -> AppResult<()> {
        self.store
            .set(&self.marker_key(kind), &now.to_string())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3_600_000;

    #[tokio::test]
    async fn keys_follow_prefix_and_kind() {
        let cache = SnapshotCache::in_memory();
        assert_eq!(cache.key("properties"), "rentala_cache_properties");
        let custom = SnapshotCache::new(Arc::new(MemoryCache::new()), "acme");
        assert_eq!(custom.key("payments"), "acme_payments");
    }

    #[tokio::test]
    async fn fresh_snapshot_round_trips() {
        let cache = SnapshotCache::in_memory();
        cache.write("tenants", &["a", "b"], 1_000).await.unwrap();
        let snapshot: CacheSnapshot<String> = cache
            .read_fresh("tenants", 1_000 + 10 * 60_000, HOUR)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.data, vec!["a", "b"]);
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.age_ms(1_000 + 10 * 60_000), 10 * 60_000);
    }

    #[tokio::test]
    async fn expired_snapshot_is_removed() {
        let store = Arc::new(MemoryCache::new());
        let cache = SnapshotCache::new(store.clone(), DEFAULT_CACHE_PREFIX);
        cache.write("tenants", &[1, 2, 3], 0).await.unwrap();
        let read: Option<CacheSnapshot<i32>> =
            cache.read_fresh("tenants", 2 * HOUR, HOUR).await.unwrap();
        assert!(read.is_none());
        assert!(store.get("rentala_cache_tenants").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_and_foreign_versions_are_evicted() {
        let store = Arc::new(MemoryCache::new());
        let cache = SnapshotCache::new(store.clone(), DEFAULT_CACHE_PREFIX);

        store.set("rentala_cache_payments", "{not json").await.unwrap();
        let read: Option<CacheSnapshot<i32>> = cache.read_fresh("payments", 0, HOUR).await.unwrap();
        assert!(read.is_none());
        assert!(store.get("rentala_cache_payments").await.unwrap().is_none());

        store
            .set(
                "rentala_cache_payments",
                r#"{"data":[1],"timestamp":0,"version":"0.9"}"#,
            )
            .await
            .unwrap();
        let read: Option<CacheSnapshot<i32>> = cache.read_fresh("payments", 0, HOUR).await.unwrap();
        assert!(read.is_none());
        assert!(store.get("rentala_cache_payments").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn initialized_marker_is_separate_from_snapshot() {
        let cache = SnapshotCache::in_memory();
        assert!(!cache.is_initialized("properties").await.unwrap());
        cache.mark_initialized("properties", 5).await.unwrap();
        assert!(cache.is_initialized("properties").await.unwrap());
        cache.clear("properties").await.unwrap();
        assert!(cache.is_initialized("properties").await.unwrap());
    }
}
