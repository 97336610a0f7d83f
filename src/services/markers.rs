use std::sync::Arc;

use axum::body::Bytes;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::database::models::{Marker, MarkerDraft, MarkerPatch, NewPhoto, Photo};
use crate::database::{DatabaseError, Store};
use crate::state::AppState;
use crate::storage::{photo_key, BlobError, BlobStore, StoredBlob};

#[derive(Debug, Error)]
pub enum MarkerError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Blob(#[from] BlobError),
}

/// One file part of a marker form
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Marker writes that span the database and the blob store.
///
/// Blobs are uploaded before the database transaction that references them.
/// A failed upload or transaction deletes whatever was stored for the request;
/// blobs of removed photos are deleted only after the commit.
pub struct MarkerService {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
}

impl MarkerService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            blobs: Arc::clone(&state.blobs),
        }
    }

    pub async fn create(&self, draft: &MarkerDraft, photos: Vec<PhotoUpload>) -> Result<Marker, MarkerError> {
        let id = self.store.reserve_marker_id().await?;
        let stored = self.upload_all(id, photos).await?;

        match self.store.insert_marker(id, draft, &stored).await {
            Ok(marker) => {
                info!(marker_id = marker.id, photos = stored.len(), "Created marker");
                Ok(marker)
            }
            Err(e) => {
                self.discard(stored_blobs(&stored)).await;
                Err(e.into())
            }
        }
    }

    /// `Ok(None)` when the marker no longer exists
    pub async fn update(
        &self,
        id: i64,
        patch: &MarkerPatch,
        photos: Vec<PhotoUpload>,
        remove_photo_ids: &[i64],
    ) -> Result<Option<Marker>, MarkerError> {
        let stored = self.upload_all(id, photos).await?;

        match self.store.update_marker(id, patch, &stored, remove_photo_ids).await {
            Ok(Some(update)) => {
                let removed: Vec<StoredBlob> = update.removed_photos.iter().map(photo_blob).collect();
                info!(marker_id = id, added = stored.len(), removed = removed.len(), "Updated marker");
                self.discard(removed).await;
                Ok(Some(update.marker))
            }
            Ok(None) => {
                self.discard(stored_blobs(&stored)).await;
                Ok(None)
            }
            Err(e) => {
                self.discard(stored_blobs(&stored)).await;
                Err(e.into())
            }
        }
    }

    /// Returns whether a marker was deleted
    pub async fn delete(&self, id: i64) -> Result<bool, MarkerError> {
        let Some(photos) = self.store.delete_marker(id).await? else {
            return Ok(false);
        };

        info!(marker_id = id, photos = photos.len(), "Deleted marker");
        self.discard(photos.iter().map(photo_blob).collect()).await;
        Ok(true)
    }

    /// Upload every photo under a key owned by `marker_id`. On the first
    /// failure the photos already stored are deleted again.
    async fn upload_all(&self, marker_id: i64, photos: Vec<PhotoUpload>) -> Result<Vec<NewPhoto>, BlobError> {
        let now = Utc::now();
        let mut stored: Vec<NewPhoto> = Vec::with_capacity(photos.len());

        for (index, photo) in photos.into_iter().enumerate() {
            let key = photo_key(marker_id, index, &photo.filename, now);
            match self.blobs.upload(&key, &photo.content_type, photo.data).await {
                Ok(blob) => stored.push(NewPhoto {
                    filename: photo.filename,
                    blob_path: blob.pathname,
                    url: blob.url,
                }),
                Err(e) => {
                    warn!(marker_id, key = %key, error = %e, "Photo upload failed");
                    self.discard(stored_blobs(&stored)).await;
                    return Err(e);
                }
            }
        }

        Ok(stored)
    }

    /// Best-effort blob removal; failures are only logged
    async fn discard(&self, blobs: Vec<StoredBlob>) {
        if blobs.is_empty() {
            return;
        }
        if let Err(e) = self.blobs.delete(&blobs).await {
            let keys: Vec<&str> = blobs.iter().map(|b| b.pathname.as_str()).collect();
            warn!(error = %e, ?keys, "Failed to delete blobs");
        }
    }
}

fn stored_blobs(photos: &[NewPhoto]) -> Vec<StoredBlob> {
    photos
        .iter()
        .map(|p| StoredBlob {
            pathname: p.blob_path.clone(),
            url: p.url.clone(),
        })
        .collect()
}

fn photo_blob(photo: &Photo) -> StoredBlob {
    StoredBlob {
        pathname: photo.blob_path.clone(),
        url: photo.url.clone(),
    }
}
