use axum::{
    extract::{rejection::PathRejection, Extension, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::visibility_for;
use crate::state::AppState;

/// GET /photo/*path - 302 to the public URL of a stored photo
pub async fn redirect(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(blob_path) = path?;
    let blob_path = blob_path.trim_start_matches('/');

    let location = state
        .store
        .find_photo(blob_path)
        .await?
        .ok_or_else(|| ApiError::not_found("Photo not found"))?;

    let visibility = visibility_for(state.store.as_ref(), &user).await?;
    if !visibility.allows(location.object_id) {
        return Err(ApiError::not_found("Photo not found"));
    }

    Ok((StatusCode::FOUND, [(header::LOCATION, location.photo.url)]).into_response())
}
