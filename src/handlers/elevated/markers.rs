use axum::extract::{rejection::PathRejection, Path, State};
use serde_json::{json, Value};

use crate::database::Visibility;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /markers/by-object/:id
pub async fn by_object(State(state): State<AppState>, path: Result<Path<i64>, PathRejection>) -> ApiResult<Value> {
    let Path(object_id) = path?;
    if state.store.get_object(object_id).await?.is_none() {
        return Err(ApiError::not_found("Object not found"));
    }

    let markers = state.store.list_markers(&Visibility::Objects(vec![object_id])).await?;
    Ok(ApiResponse::success(json!({ "markers": markers })))
}
