use async_trait::async_trait;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Appointment, Marker, MarkerDraft, MarkerPatch, NewPhoto, Object, ObjectInput, Photo, User, UserInput,
};

/// Which objects' rows a caller may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Administrators: every row, including markers without an object
    All,
    /// Only rows belonging to these objects. Empty means nothing.
    Objects(Vec<i64>),
}

impl Visibility {
    pub fn allows(&self, object_id: Option<i64>) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Objects(ids) => object_id.is_some_and(|id| ids.contains(&id)),
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Visibility::Objects(ids) if ids.is_empty())
    }
}

/// Result of an edit: the marker as stored afterwards plus the photo rows
/// that were removed (their blobs still need deleting)
#[derive(Debug, Clone)]
pub struct MarkerUpdate {
    pub marker: Marker,
    pub removed_photos: Vec<Photo>,
}

/// A photo together with the object its marker belongs to
#[derive(Debug, Clone)]
pub struct PhotoLocation {
    pub photo: Photo,
    pub object_id: Option<i64>,
}

/// Repository seam between handlers and the relational store
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;

    // Users
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError>;
    async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError>;
    async fn find_user_by_username(&self, telegram_username: &str) -> Result<Option<User>, DatabaseError>;
    async fn create_user(&self, input: &UserInput) -> Result<User, DatabaseError>;
    async fn update_user(&self, id: i64, input: &UserInput) -> Result<Option<User>, DatabaseError>;
    async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError>;

    // Objects
    async fn list_objects(&self, visibility: &Visibility) -> Result<Vec<Object>, DatabaseError>;
    async fn get_object(&self, id: i64) -> Result<Option<Object>, DatabaseError>;
    /// Insert an object; when `owner_id` is given the owner is appointed to
    /// it in the same transaction
    async fn create_object(&self, input: &ObjectInput, owner_id: Option<i64>) -> Result<Object, DatabaseError>;
    async fn update_object(&self, id: i64, input: &ObjectInput) -> Result<Option<Object>, DatabaseError>;
    async fn delete_object(&self, id: i64) -> Result<bool, DatabaseError>;

    // Appointments
    async fn appointed_object_ids(&self, user_id: i64) -> Result<Vec<i64>, DatabaseError>;
    async fn list_appointments(&self) -> Result<Vec<Appointment>, DatabaseError>;
    /// Remove the pair if present, add it otherwise. Returns whether the pair
    /// exists afterwards.
    async fn toggle_appointment(&self, appointment: Appointment) -> Result<bool, DatabaseError>;

    // Markers
    /// Allocate a marker id without writing a row
    async fn reserve_marker_id(&self) -> Result<i64, DatabaseError>;
    /// Insert the marker under a reserved id together with its photo rows, atomically
    async fn insert_marker(&self, id: i64, draft: &MarkerDraft, photos: &[NewPhoto]) -> Result<Marker, DatabaseError>;
    async fn list_markers(&self, visibility: &Visibility) -> Result<Vec<Marker>, DatabaseError>;
    async fn get_marker(&self, id: i64) -> Result<Option<Marker>, DatabaseError>;
    /// Apply the patch, add `new_photos` and remove the photos in
    /// `remove_photo_ids` that belong to this marker, atomically
    async fn update_marker(
        &self,
        id: i64,
        patch: &MarkerPatch,
        new_photos: &[NewPhoto],
        remove_photo_ids: &[i64],
    ) -> Result<Option<MarkerUpdate>, DatabaseError>;
    /// Delete the marker and its photo rows. Returns the removed photos.
    async fn delete_marker(&self, id: i64) -> Result<Option<Vec<Photo>>, DatabaseError>;
    async fn find_photo(&self, blob_path: &str) -> Result<Option<PhotoLocation>, DatabaseError>;
}
