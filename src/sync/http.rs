use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{SyncClient, SyncError};
use crate::entity::{Entity, EntityFields};
use crate::id::EntityId;
use crate::{AppError, AppResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// `SyncClient` over the Express-style `/api/<kind>` endpoints.
pub struct HttpSyncClient<F> {
    client: Client,
    collection: Url,
    token: Option<String>,
    timeout: Duration,
    _kind: PhantomData<fn() -> F>,
}

impl<F: EntityFields> HttpSyncClient<F> {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> AppResult<Self> {
        let invalid_base = || {
            AppError::new("SYNC/INVALID_BASE_URL", "API base URL cannot hold a path")
                .with_context("base_url", base_url)
        };
        let mut collection = Url::parse(base_url.trim()).map_err(|err| {
            invalid_base().with_context("error", err.to_string())
        })?;
        collection
            .path_segments_mut()
            .map_err(|_| invalid_base())?
            .pop_if_empty()
            .extend(["api", F::KIND]);

        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            AppError::new("SYNC/CLIENT_BUILD", "Failed to build HTTP client")
                .with_context("error", err.to_string())
        })?;
        Ok(Self {
            client,
            collection,
            token: token.filter(|t| !t.trim().is_empty()),
            timeout,
            _kind: PhantomData,
        })
    }

    pub fn collection_url(&self) -> Url {
        self.collection.clone()
    }

    /// The id is pushed as one percent-encoded path segment.
    pub fn item_url(&self, id: &EntityId) -> Url {
        let mut url = self.collection.clone();
        // `new` rejected bases that cannot carry path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id.as_str());
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, method: &'static str, request: RequestBuilder) -> Result<Vec<u8>, SyncError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;
        debug!(
            target: "rentala",
            event = "sync_response",
            kind = F::KIND,
            method,
            status = status.as_u16(),
            bytes = bytes.len()
        );
        check_status(status, &bytes)?;
        Ok(bytes.to_vec())
    }

    fn transport_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::network(format!(
                "request timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            SyncError::network(err.to_string())
        }
    }
}

pub(crate) fn check_status(status: StatusCode, body: &[u8]) -> Result<(), SyncError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(SyncError::Server {
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

pub(crate) fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, SyncError> {
    serde_json::from_slice(body).map_err(|err| SyncError::parse(err.to_string()))
}

/// Decodes a collection one record at a time. Records that do not fit the
/// entity shape are dropped with a warning instead of failing the list.
pub(crate) fn decode_list<F: EntityFields>(body: &[u8]) -> Result<Vec<Entity<F>>, SyncError> {
    let raw: Vec<Value> = decode_body(body)?;
    let total = raw.len();
    let entities: Vec<Entity<F>> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(position, value)| {
            let id = match value.get("id") {
                Some(Value::String(id)) => id.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            match serde_json::from_value(value) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    warn!(
                        target: "rentala",
                        event = "record_dropped",
                        kind = F::KIND,
                        position,
                        id = %id,
                        error = %err
                    );
                    None
                }
            }
        })
        .collect();
    if entities.len() < total {
        warn!(
            target: "rentala",
            event = "records_dropped",
            kind = F::KIND,
            dropped = total - entities.len(),
            kept = entities.len()
        );
    }
    Ok(entities)
}

/// Delete confirmations vary between servers; accept an empty body or any JSON.
pub(crate) fn decode_confirmation(body: &[u8]) -> Result<(), SyncError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    decode_body::<serde_json::Value>(body).map(|_| ())
}

#[async_trait]
impl<F: EntityFields> SyncClient<F> for HttpSyncClient<F> {
    async fn fetch_all(&self) -> Result<Vec<Entity<F>>, SyncError> {
        let body = self
            .send("GET", self.client.get(self.collection_url()))
            .await?;
        decode_list(&body)
    }

    async fn create(&self, fields: &F) -> Result<Entity<F>, SyncError> {
        let body = self
            .send("POST", self.client.post(self.collection_url()).json(fields))
            .await?;
        decode_body(&body)
    }

    async fn update(&self, id: &EntityId, patch: &F::Patch) -> Result<Entity<F>, SyncError> {
        let body = self
            .send("PUT", self.client.put(self.item_url(id)).json(patch))
            .await?;
        decode_body(&body)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), SyncError> {
        let body = self
            .send("DELETE", self.client.delete(self.item_url(id)))
            .await?;
        decode_confirmation(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{PaymentFields, PropertyFields, PropertyStatus, TenantFields};

    #[test]
    fn urls_follow_the_collection_contract() {
        let client: HttpSyncClient<PropertyFields> =
            HttpSyncClient::new("http://localhost:3000/", None, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            client.collection_url().as_str(),
            "http://localhost:3000/api/properties"
        );
        assert_eq!(
            client.item_url(&EntityId::from("17")).as_str(),
            "http://localhost:3000/api/properties/17"
        );

        let payments: HttpSyncClient<PaymentFields> =
            HttpSyncClient::new("https://rentala.example/v2", None, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            payments.collection_url().as_str(),
            "https://rentala.example/v2/api/payments"
        );
    }

    #[test]
    fn ids_are_encoded_as_one_segment() {
        let client: HttpSyncClient<TenantFields> =
            HttpSyncClient::new("http://localhost:3000", None, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            client.item_url(&EntityId::from("a/b?c#d")).as_str(),
            "http://localhost:3000/api/tenants/a%2Fb%3Fc%23d"
        );
    }

    #[test]
    fn bases_without_a_path_are_rejected() {
        let err = HttpSyncClient::<TenantFields>::new("mailto:ops@rentala.example", None, DEFAULT_TIMEOUT)
            .err()
            .unwrap();
        assert_eq!(err.code(), "SYNC/INVALID_BASE_URL");
        assert!(HttpSyncClient::<TenantFields>::new("not a url", None, DEFAULT_TIMEOUT).is_err());
    }

    #[test]
    fn unknown_records_are_dropped_not_the_list() {
        let body = br#"[
            {"id": 1, "name": "Sunset Villa", "status": "active"},
            {"id": 2, "name": "Garden House", "status": "occupied"},
            {"id": 3, "name": "Old Mill", "status": "demolished"},
            {"id": 4, "name": "Tech Park", "status": "vacant"}
        ]"#;
        let list = decode_list::<PropertyFields>(body).unwrap();
        let ids: Vec<&str> = list.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
        assert_eq!(list[1].status(), PropertyStatus::Occupied);

        assert_eq!(decode_list::<PropertyFields>(br#"{"error":"x"}"#).unwrap_err().kind(), "parse");
    }

    #[test]
    fn blank_tokens_are_dropped() {
        let client: HttpSyncClient<PropertyFields> =
            HttpSyncClient::new("http://x", Some("  ".into()), DEFAULT_TIMEOUT).unwrap();
        assert!(client.token.is_none());
    }

    #[test]
    fn non_success_status_is_a_server_error() {
        let err = check_status(StatusCode::NOT_FOUND, br#"{"error":"Payment not found"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::Server {
                status: 404,
                body: r#"{"error":"Payment not found"}"#.into()
            }
        );
        assert!(check_status(StatusCode::CREATED, b"").is_ok());
    }

    #[test]
    fn malformed_bodies_are_parse_errors() {
        let err = decode_body::<Vec<Entity<PropertyFields>>>(b"<html>oops</html>").unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn delete_confirmation_accepts_empty_or_json() {
        assert!(decode_confirmation(b"").is_ok());
        assert!(decode_confirmation(b"  \n").is_ok());
        assert!(decode_confirmation(br#"{"message":"Payment deleted"}"#).is_ok());
        assert_eq!(decode_confirmation(b"deleted").unwrap_err().kind(), "parse");
    }
}
