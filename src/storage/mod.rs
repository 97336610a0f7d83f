//! Blob storage for photo payloads.
//!
//! Handlers only see the [`BlobStore`] trait; [`http::HttpBlobStore`] talks to
//! the external object store.

pub mod http;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use http::HttpBlobStore;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob store request failed: {0}")]
    Transport(String),

    #[error("Blob store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected blob store response: {0}")]
    InvalidResponse(String),

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),
}

impl BlobError {
    /// Transport failures and 5xx responses are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            BlobError::Transport(_) => true,
            BlobError::Status { status, .. } => *status >= 500,
            BlobError::InvalidResponse(_) | BlobError::InvalidKey(_) => false,
        }
    }
}

/// A stored payload: its key and where it can be fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub pathname: String,
    pub url: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, key: &str, content_type: &str, data: Bytes) -> Result<StoredBlob, BlobError>;

    /// Remove stored payloads. Blobs that are already gone count as deleted.
    async fn delete(&self, blobs: &[StoredBlob]) -> Result<(), BlobError>;
}

/// Key for the `index`-th photo of a marker, unique per upload:
/// `markers/{marker_id}/{unix_millis}-{index}-{random}-{sanitized filename}`
pub fn photo_key(marker_id: i64, index: usize, filename: &str, now: DateTime<Utc>) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "markers/{}/{}-{}-{}-{}",
        marker_id,
        now.timestamp_millis(),
        index,
        &nonce[..8],
        sanitize_filename(filename)
    )
}

/// Keep ASCII letters, digits, `.`, `-` and `_`; everything else becomes `_`.
/// Path separators never survive, so a filename cannot escape its prefix.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .take(100)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "photo".to_string()
    } else {
        cleaned.to_string()
    }
}
