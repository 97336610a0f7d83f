use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: i64,
    pub marker_id: i64,
    pub filename: String,
    /// Blob store key
    pub blob_path: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Photo row to persist once its blob is stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub filename: String,
    pub blob_path: String,
    pub url: String,
}
