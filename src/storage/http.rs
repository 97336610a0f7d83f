use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::{BlobError, BlobStore, StoredBlob};
use crate::config::StorageConfig;

/// Blob REST API revision sent with every request
const API_VERSION: &str = "7";

#[derive(Debug, Deserialize)]
struct PutResponse {
    url: String,
    pathname: Option<String>,
}

/// Client for the Vercel Blob REST API:
/// `PUT {api_url}/{pathname}` stores a payload and answers `{url, pathname}`,
/// `POST {api_url}/delete` with `{"urls": [...]}` removes payloads by public URL.
#[derive(Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    api_url: String,
    token: String,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpBlobStore {
    pub fn new(config: &StorageConfig) -> Result<Self, BlobError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BlobError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            max_retries: config.max_retries.max(1),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    fn object_url(&self, key: &str) -> Result<url::Url, BlobError> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|seg| seg == "..") {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        url::Url::parse(&format!("{}/{}", self.api_url, key)).map_err(|_| BlobError::InvalidKey(key.to_string()))
    }

    async fn put_once(&self, url: &url::Url, key: &str, content_type: &str, data: Bytes) -> Result<StoredBlob, BlobError> {
        let response = self
            .client
            .put(url.clone())
            .bearer_auth(&self.token)
            .header("x-api-version", API_VERSION)
            .header("x-content-type", content_type)
            // Keys are already unique; keep them as given
            .header("x-add-random-suffix", "0")
            .header(header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| BlobError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let stored: PutResponse = response
            .json()
            .await
            .map_err(|e| BlobError::InvalidResponse(e.to_string()))?;

        Ok(StoredBlob {
            pathname: stored.pathname.unwrap_or_else(|| key.to_string()),
            url: stored.url,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay * 2_u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, key: &str, content_type: &str, data: Bytes) -> Result<StoredBlob, BlobError> {
        let url = self.object_url(key)?;

        for attempt in 1..=self.max_retries {
            debug!(key, attempt, max_retries = self.max_retries, bytes = data.len(), "Uploading blob");

            // Bytes clones share the buffer
            match self.put_once(&url, key, content_type, data.clone()).await {
                Ok(stored) => return Ok(stored),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(key, attempt, error = %e, ?delay, "Blob upload failed, retrying");
                    sleep(delay).await;
                }
                Err(e) => {
                    error!(key, attempt, error = %e, "Blob upload failed");
                    return Err(e);
                }
            }
        }

        Err(BlobError::Transport(format!("upload of {key} was not attempted")))
    }

    async fn delete(&self, blobs: &[StoredBlob]) -> Result<(), BlobError> {
        if blobs.is_empty() {
            return Ok(());
        }

        let urls: Vec<&str> = blobs.iter().map(|b| b.url.as_str()).collect();
        let response = self
            .client
            .post(format!("{}/delete", self.api_url))
            .bearer_auth(&self.token)
            .header("x-api-version", API_VERSION)
            .json(&json!({ "urls": urls }))
            .send()
            .await
            .map_err(|e| BlobError::Transport(e.to_string()))?;

        match response.status() {
            // Already gone counts as deleted
            s if s.is_success() || s == StatusCode::NOT_FOUND => {
                debug!(count = blobs.len(), "Deleted blobs");
                Ok(())
            }
            s => Err(BlobError::Status {
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
