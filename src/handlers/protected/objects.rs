use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::ObjectInput;
use crate::error::ApiError;
use crate::handlers::unique_as;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::visibility_for;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ObjectBody {
    pub name: Option<String>,
    pub additional_info: Option<String>,
}

impl ObjectBody {
    pub fn into_input(self) -> Result<ObjectInput, ApiError> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(ApiError::invalid_field("name", "is required"));
        }
        Ok(ObjectInput {
            name: name.to_string(),
            additional_info: self
                .additional_info
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}

/// GET /objects - Objects the caller is appointed to (all for admins)
pub async fn list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let visibility = visibility_for(state.store.as_ref(), &user).await?;
    let objects = state.store.list_objects(&visibility).await?;
    Ok(ApiResponse::success(json!({ "objects": objects })))
}

/// POST /objects - Create an object and appoint the creator to it
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<ObjectBody>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let input = body.into_input()?;

    let object = state
        .store
        .create_object(&input, Some(user.id))
        .await
        .map_err(unique_as("Object name already exists"))?;

    tracing::info!(object_id = object.id, user_id = user.id, "Created object");
    Ok(ApiResponse::created(json!({ "object": object })))
}
