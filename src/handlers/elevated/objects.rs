use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde_json::{json, Value};

use crate::database::Visibility;
use crate::error::ApiError;
use crate::handlers::protected::objects::ObjectBody;
use crate::handlers::unique_as;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

const NAME_TAKEN: &str = "Object name already exists";

/// GET /admin/object
pub async fn list(State(state): State<AppState>) -> ApiResult<Value> {
    let objects = state.store.list_objects(&Visibility::All).await?;
    Ok(ApiResponse::success(json!({ "objects": objects })))
}

/// GET /admin/object/:id
pub async fn show(State(state): State<AppState>, path: Result<Path<i64>, PathRejection>) -> ApiResult<Value> {
    let Path(id) = path?;
    let object = state.store.get_object(id).await?.ok_or_else(object_not_found)?;
    Ok(ApiResponse::success(json!({ "object": object })))
}

/// POST /admin/object - Create without appointing anyone
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<ObjectBody>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let input = body.into_input()?;

    let object = state
        .store
        .create_object(&input, None)
        .await
        .map_err(unique_as(NAME_TAKEN))?;
    Ok(ApiResponse::created(json!({ "object": object })))
}

/// POST /admin/object/:id
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<ObjectBody>, JsonRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    let Json(body) = body?;
    let input = body.into_input()?;

    let object = state
        .store
        .update_object(id, &input)
        .await
        .map_err(unique_as(NAME_TAKEN))?
        .ok_or_else(object_not_found)?;
    Ok(ApiResponse::success(json!({ "object": object })))
}

/// DELETE /admin/object/:id - Appointments go with it; markers lose their object
pub async fn remove(State(state): State<AppState>, path: Result<Path<i64>, PathRejection>) -> ApiResult<Value> {
    let Path(id) = path?;
    if !state.store.delete_object(id).await? {
        return Err(object_not_found());
    }
    tracing::info!(object_id = id, "Deleted object");
    Ok(ApiResponse::success(json!({ "deleted": id })))
}

fn object_not_found() -> ApiError {
    ApiError::not_found("Object not found")
}
