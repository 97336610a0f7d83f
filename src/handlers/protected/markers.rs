use axum::extract::{multipart::MultipartRejection, rejection::PathRejection, Extension, Multipart, Path, State};
use serde_json::{json, Value};

use crate::database::models::Marker;
use crate::database::Store;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{visibility_for, MarkerService};
use crate::state::AppState;

use super::marker_form::MarkerForm;

/// POST /upload - Create a marker from a multipart form, photos included
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Value> {
    let form = MarkerForm::read(multipart?).await?;
    let draft = form.draft()?;
    require_object(&user, draft.object_id)?;
    ensure_object_allowed(state.store.as_ref(), &user, draft.object_id).await?;

    let marker = MarkerService::new(&state).create(&draft, form.photos).await?;
    Ok(ApiResponse::created(json!({ "marker": marker })))
}

/// GET /markers - Markers in the caller's objects (everything for admins)
pub async fn list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let visibility = visibility_for(state.store.as_ref(), &user).await?;
    let markers = state.store.list_markers(&visibility).await?;
    Ok(ApiResponse::success(json!({ "markers": markers })))
}

/// GET /marker/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    let marker = visible_marker(state.store.as_ref(), &user, id).await?;
    Ok(ApiResponse::success(json!({ "marker": marker })))
}

/// POST /marker/:id - Edit fields, add photos and remove `delete_photo` ids
pub async fn edit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    let form = MarkerForm::read(multipart?).await?;
    let patch = form.patch()?;

    visible_marker(state.store.as_ref(), &user, id).await?;
    if let Some(object_id) = patch.object_id {
        require_object(&user, object_id)?;
        ensure_object_allowed(state.store.as_ref(), &user, object_id).await?;
    }

    let marker = MarkerService::new(&state)
        .update(id, &patch, form.photos, &form.delete_photo_ids)
        .await?
        .ok_or_else(marker_not_found)?;
    Ok(ApiResponse::success(json!({ "marker": marker })))
}

/// DELETE /marker/:id - Remove the marker, its photo rows and their blobs
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    visible_marker(state.store.as_ref(), &user, id).await?;

    if !MarkerService::new(&state).delete(id).await? {
        return Err(marker_not_found());
    }
    Ok(ApiResponse::success(json!({ "deleted": id })))
}

/// The marker, or 404 when it does not exist or lies outside the caller's objects
async fn visible_marker(store: &dyn Store, user: &AuthUser, id: i64) -> Result<Marker, ApiError> {
    let marker = store.get_marker(id).await?.ok_or_else(marker_not_found)?;
    let visibility = visibility_for(store, user).await?;
    if !visibility.allows(marker.object_id) {
        tracing::debug!(user_id = user.id, marker_id = id, "Marker outside caller's objects");
        return Err(marker_not_found());
    }
    Ok(marker)
}

/// A marker without an object is only visible to admins, so everyone else
/// has to name one
fn require_object(user: &AuthUser, object_id: Option<i64>) -> Result<(), ApiError> {
    if object_id.is_none() && !user.is_admin() {
        return Err(ApiError::invalid_field("object_id", "is required"));
    }
    Ok(())
}

/// Non-admins may only attach markers to objects they are appointed to
pub(crate) async fn ensure_object_allowed(
    store: &dyn Store,
    user: &AuthUser,
    object_id: Option<i64>,
) -> Result<(), ApiError> {
    let Some(object_id) = object_id else {
        return Ok(());
    };

    if store.get_object(object_id).await?.is_none() {
        return Err(ApiError::not_found("Object not found"));
    }
    if !visibility_for(store, user).await?.allows(Some(object_id)) {
        return Err(ApiError::forbidden("You are not assigned to this object"));
    }
    Ok(())
}

fn marker_not_found() -> ApiError {
    ApiError::not_found("Marker not found")
}
