//! Remote API boundary.
//!
//! A [`SyncClient`] speaks the `/api/<kind>` JSON contract for one entity
//! type. It carries no business rules: it either hands back decoded entities
//! or a [`SyncError`] saying which layer failed.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::entity::{Entity, EntityFields};
use crate::id::EntityId;

pub mod http;

pub use http::HttpSyncClient;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncError {
    /// Transport failure or timeout; the server may never have seen the request.
    #[error("network error: {message}")]
    Network { message: String },
    /// The server answered with a non-2xx status.
    #[error("server responded with {status}: {body}")]
    Server { status: u16, body: String },
    /// The server answered 2xx but the body could not be decoded.
    #[error("malformed response: {message}")]
    Parse { message: String },
}

impl SyncError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Network { .. } => "SYNC/NETWORK",
            Self::Server { .. } => "SYNC/SERVER",
            Self::Parse { .. } => "SYNC/PARSE",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Server { .. } => "server",
            Self::Parse { .. } => "parse",
        }
    }
}

#[async_trait]
pub trait SyncClient<F: EntityFields>: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Entity<F>>, SyncError>;
    async fn create(&self, fields: &F) -> Result<Entity<F>, SyncError>;
    async fn update(&self, id: &EntityId, patch: &F::Patch) -> Result<Entity<F>, SyncError>;
    async fn delete(&self, id: &EntityId) -> Result<(), SyncError>;
}

/// Client for running without a backend. Every call fails as a network
/// error, so stores fall back to their cache and optimistic local state.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineClient;

const OFFLINE_MESSAGE: &str = "offline mode: remote API disabled";

#[async_trait]
impl<F: EntityFields> SyncClient<F> for OfflineClient {
    async fn fetch_all(&self) -> Result<Vec<Entity<F>>, SyncError> {
        Err(SyncError::network(OFFLINE_MESSAGE))
    }

    async fn create(&self, _fields: &F) -> Result<Entity<F>, SyncError> {
        Err(SyncError::network(OFFLINE_MESSAGE))
    }

    async fn update(&self, _id: &EntityId, _patch: &F::Patch) -> Result<Entity<F>, SyncError> {
        Err(SyncError::network(OFFLINE_MESSAGE))
    }

    async fn delete(&self, _id: &EntityId) -> Result<(), SyncError> {
        Err(SyncError::network(OFFLINE_MESSAGE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_the_failure_layer() {
        assert_eq!(SyncError::network("reset").code(), "SYNC/NETWORK");
        assert_eq!(
            SyncError::Server {
                status: 500,
                body: String::new()
            }
            .kind(),
            "server"
        );
        assert_eq!(SyncError::parse("eof").code(), "SYNC/PARSE");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let value = serde_json::to_value(SyncError::Server {
            status: 404,
            body: "{\"error\":\"Payment not found\"}".into(),
        })
        .unwrap();
        assert_eq!(value["kind"], "server");
        assert_eq!(value["status"], 404);
    }
}
