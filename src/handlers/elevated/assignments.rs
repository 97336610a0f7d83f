use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::Appointment;
use crate::database::Visibility;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// Ids arrive as numbers or numeric strings
#[derive(Debug, Deserialize)]
pub struct ToggleBody {
    #[serde(default)]
    pub user_id: Value,
    #[serde(default)]
    pub object_id: Value,
}

impl ToggleBody {
    fn appointment(&self) -> Result<Appointment, ApiError> {
        Ok(Appointment {
            user_id: id_value("user_id", &self.user_id)?,
            object_id: id_value("object_id", &self.object_id)?,
        })
    }
}

fn id_value(field: &str, value: &Value) -> Result<i64, ApiError> {
    let id = match value {
        Value::Null => return Err(ApiError::invalid_field(field, "is required")),
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.filter(|id| *id > 0)
        .ok_or_else(|| ApiError::invalid_field(field, "must be a positive integer"))
}

/// GET /assignments - Everything an assignment matrix needs in one response
pub async fn overview(State(state): State<AppState>) -> ApiResult<Value> {
    let users = state.store.list_users().await?;
    let objects = state.store.list_objects(&Visibility::All).await?;
    let assignments = state.store.list_appointments().await?;

    Ok(ApiResponse::success(json!({
        "users": users,
        "objects": objects,
        "assignments": assignments,
    })))
}

/// POST /assignments/toggle - Add the pair if missing, remove it otherwise
pub async fn toggle(
    State(state): State<AppState>,
    body: Result<Json<ToggleBody>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let appointment = body.appointment()?;

    if state.store.get_user(appointment.user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    if state.store.get_object(appointment.object_id).await?.is_none() {
        return Err(ApiError::not_found("Object not found"));
    }

    let assigned = state.store.toggle_appointment(appointment).await?;
    tracing::info!(
        user_id = appointment.user_id,
        object_id = appointment.object_id,
        assigned,
        "Toggled appointment"
    );
    Ok(ApiResponse::success(json!({ "assigned": assigned })))
}
