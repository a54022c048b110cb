//! REST client for the booking backend.
//!
//! - `ApiClient` is the single place requests are built: base URL joining,
//!   bearer token from the token store, status and body handling
//! - `RestStore<E>` implements `EntityStore<E>` on top of it
//! - `UserDirectory` fetches the read-only user list for selectors

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::AdminConfig;
use crate::error::{ApiError, StoreError};
use crate::models::{Entity, EntityId, Payload, UserSummary};
use crate::store::{EntityStore, StoreSnapshot, StoreState};
use crate::token_store::{TokenStore, TOKEN_KEY};

/// HTTP client bound to one backend.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// No request timeout is configured; calls wait for the backend.
    pub fn new(base_url: &str, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            tokens,
        }
    }

    pub fn from_config(config: &AdminConfig, tokens: Arc<dyn TokenStore>) -> Self {
        Self::new(&config.backend_url, tokens)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        Ok(match self.tokens.get(TOKEN_KEY)? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = self.authorized(request)?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!(%url, "GET");
        self.send(self.http.get(&url)).await
    }

    pub async fn post_json<B: Serialize + ?Sized + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!(%url, "POST");
        self.send(self.http.post(&url).json(body)).await
    }

    pub async fn put_json<B: Serialize + ?Sized + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!(%url, "PUT");
        self.send(self.http.put(&url).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        debug!(%url, "DELETE");
        self.send(self.http.delete(&url)).await.map(|_| ())
    }
}

/// Responses are either bare or wrapped as `{ "<key>": ... }`.
pub(crate) fn unwrap_envelope(body: Value, key: &str) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key(key) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Source of the user list shown in the appointment form.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn fetch_users(&self) -> Result<Vec<UserSummary>, ApiError>;
}

#[async_trait]
impl UserDirectory for ApiClient {
    /// `GET /users`; the collection lives under the `user` field.
    async fn fetch_users(&self) -> Result<Vec<UserSummary>, ApiError> {
        let body = self.get_json("users").await?;
        match body {
            Value::Object(mut map) => match map.remove("user") {
                Some(users) => decode(users),
                None => Err(ApiError::Decode("missing 'user' field".to_string())),
            },
            _ => Err(ApiError::Decode("expected a JSON object".to_string())),
        }
    }
}

/// `EntityStore` backed by the REST API. Every successful mutation reloads
/// the collection.
pub struct RestStore<E> {
    api: Arc<ApiClient>,
    state: StoreState<E>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity + DeserializeOwned> RestStore<E> {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            state: StoreState::new(Vec::new()),
            _entity: PhantomData,
        }
    }

    fn item_path(id: EntityId) -> String {
        format!("{}/{}", E::KIND.collection_path(), id)
    }

    fn decode_record(body: Value) -> Result<E, ApiError> {
        let record: E = decode(unwrap_envelope(body, E::KIND.singular_key()))?;
        if record.id().is_none() {
            warn!(kind = %E::KIND, "backend response carried no id");
        }
        Ok(record)
    }

    async fn refresh_after_change(&self) {
        if let Err(e) = self.refresh().await {
            warn!(kind = %E::KIND, error = %e, "list refresh after change failed");
        }
    }
}

#[async_trait]
impl<E: Entity + DeserializeOwned> EntityStore<E> for RestStore<E> {
    fn list(&self) -> Vec<E> {
        self.state.update(|state| state.items.clone())
    }

    fn loading(&self) -> bool {
        self.state.update(|state| state.loading)
    }

    fn error(&self) -> Option<String> {
        self.state.update(|state| state.error.clone())
    }

    fn snapshot(&self) -> StoreSnapshot<E> {
        self.state.snapshot()
    }

    async fn refresh(&self) -> Result<(), StoreError> {
        self.state.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self
            .api
            .get_json(E::KIND.collection_path())
            .await
            .and_then(|body| decode::<Vec<E>>(unwrap_envelope(body, E::KIND.plural_key())));

        match result {
            Ok(items) => {
                debug!(kind = %E::KIND, count = items.len(), "list refreshed");
                self.state.update(|state| {
                    state.items = items;
                    state.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.state.update(|state| {
                    state.loading = false;
                    state.error = Some(message);
                });
                Err(e.into())
            }
        }
    }

    async fn create(&self, payload: E::Payload) -> Result<E, StoreError> {
        let body = self
            .api
            .post_json(E::KIND.collection_path(), &payload)
            .await?;
        let record = Self::decode_record(body)?;
        info!(kind = %E::KIND, id = ?record.id(), "created");
        self.refresh_after_change().await;
        Ok(record)
    }

    async fn update(&self, payload: E::Payload) -> Result<E, StoreError> {
        let id = payload.id().ok_or(StoreError::MissingId { kind: E::KIND })?;
        let body = self.api.put_json(&Self::item_path(id), &payload).await?;
        let record = Self::decode_record(body)?;
        info!(kind = %E::KIND, id, "updated");
        self.refresh_after_change().await;
        Ok(record)
    }

    async fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        self.api.delete(&Self::item_path(id)).await?;
        info!(kind = %E::KIND, id, "removed");
        self.refresh_after_change().await;
        Ok(())
    }
}
