//! HTTP client for the records API and object storage.
//!
//! Thin reqwest wrapper: JSON for record mutations, raw bytes plus a
//! sha256 content hash for photo uploads. Bearer-token auth is set by the
//! session layer; the sync core never handles the login flow itself.

use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::remote::RemoteStore;
use async_trait::async_trait;
use bdpa_types::EntityKind;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::RwLock;
use tracing::debug;

/// Production client for the remote authoritative store.
pub struct RemoteClient {
    client: Client,
    config: RemoteConfig,
    bearer_token: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct CreatedResponse {
    id: String,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self { client, config, bearer_token: RwLock::new(None) }
    }

    /// Sets the bearer token (from the session layer).
    pub fn set_token(&self, token: String) {
        *self.bearer_token.write().unwrap() = Some(token);
    }

    pub fn clear_token(&self) {
        *self.bearer_token.write().unwrap() = None;
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer_token.read().unwrap().as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn records_url(&self, kind: EntityKind) -> RemoteResult<String> {
        let segment = match kind {
            EntityKind::Avance => "avances",
            EntityKind::Medicion => "mediciones",
            EntityKind::Foto => {
                return Err(RemoteError::Api(
                    "fotos are uploaded to object storage, not the records API".into(),
                ))
            }
        };
        Ok(format!("{}/api/{segment}", self.config.api_base_url))
    }

    /// Maps a response to the error taxonomy: 409 is a conflict, any other
    /// non-2xx is a transport failure (retryable).
    async fn check(resp: Response, entity: EntityKind, id: &str) -> RemoteResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            return Err(RemoteError::Conflict {
                entity: entity.to_string(),
                id: id.to_string(),
                detail,
            });
        }
        Err(RemoteError::Transport(format!("{entity} {id}: HTTP {status}: {detail}")))
    }
}

#[async_trait]
impl RemoteStore for RemoteClient {
    async fn create_record(
        &self,
        kind: EntityKind,
        payload: &serde_json::Value,
    ) -> RemoteResult<String> {
        let url = self.records_url(kind)?;
        let resp = self.authorize(self.client.post(&url)).json(payload).send().await?;
        let id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let resp = Self::check(resp, kind, &id).await?;
        let created: CreatedResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Api(format!("create response: {e}")))?;
        debug!(%kind, id = created.id, "record created remotely");
        Ok(created.id)
    }

    async fn update_record(
        &self,
        kind: EntityKind,
        id: &str,
        payload: &serde_json::Value,
    ) -> RemoteResult<()> {
        let url = format!("{}/{id}", self.records_url(kind)?);
        let resp = self.authorize(self.client.patch(&url)).json(payload).send().await?;
        Self::check(resp, kind, id).await?;
        debug!(%kind, id, "record updated remotely");
        Ok(())
    }

    async fn delete_record(&self, kind: EntityKind, id: &str) -> RemoteResult<()> {
        let url = format!("{}/{id}", self.records_url(kind)?);
        let resp = self.authorize(self.client.delete(&url)).send().await?;
        // An already-deleted record is a success: delete replay is idempotent.
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(%kind, id, "record already gone remotely");
            return Ok(());
        }
        Self::check(resp, kind, id).await?;
        debug!(%kind, id, "record deleted remotely");
        Ok(())
    }

    async fn upload_photo(&self, bucket: &str, path: &str, bytes: &[u8]) -> RemoteResult<String> {
        let url = format!("{}/storage/v1/object/{bucket}/{path}", self.config.api_base_url);
        let content_hash = hex::encode(Sha256::digest(bytes));
        let resp = self
            .authorize(self.client.post(&url))
            .header("x-content-sha256", &content_hash)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;
        Self::check(resp, EntityKind::Foto, path).await?;

        let public_url =
            format!("{}/storage/v1/object/public/{bucket}/{path}", self.config.api_base_url);
        debug!(path, bytes = bytes.len(), "photo uploaded");
        Ok(public_url)
    }
}
