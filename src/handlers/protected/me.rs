use axum::extract::{Extension, State};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::visibility_for;
use crate::state::AppState;

/// GET /me - Stored profile of the caller and the objects they can see
pub async fn show(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    // A valid token for a deleted user is no longer a session
    let profile = state
        .store
        .get_user(user.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    let visibility = visibility_for(state.store.as_ref(), &user).await?;
    let objects = state.store.list_objects(&visibility).await?;

    Ok(ApiResponse::success(json!({ "user": profile, "objects": objects })))
}
