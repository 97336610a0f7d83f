use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::user::UnknownRole;
use crate::database::models::{Role, User, UserInput};
use crate::error::ApiError;
use crate::handlers::unique_as;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

const USERNAME_TAKEN: &str = "Telegram username already exists";

/// Create/update body. On update, absent fields keep the stored value and
/// an empty string clears an optional one.
#[derive(Debug, Default, Deserialize)]
pub struct UserBody {
    pub telegram_username: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub additional_info: Option<String>,
}

impl UserBody {
    fn into_new(self) -> Result<UserInput, ApiError> {
        let username = self
            .telegram_username
            .as_deref()
            .ok_or_else(|| ApiError::invalid_field("telegram_username", "is required"))?;

        Ok(UserInput {
            telegram_username: normalize_username(username)?,
            full_name: self.full_name.as_deref().and_then(optional),
            phone: self.phone.as_deref().and_then(optional),
            role: parse_role(self.role.as_deref())?.unwrap_or(Role::User),
            additional_info: self.additional_info.as_deref().and_then(optional),
        })
    }

    fn merge_into(self, current: User) -> Result<UserInput, ApiError> {
        Ok(UserInput {
            telegram_username: match self.telegram_username.as_deref() {
                Some(username) => normalize_username(username)?,
                None => current.telegram_username,
            },
            full_name: merge(self.full_name, current.full_name),
            phone: merge(self.phone, current.phone),
            role: parse_role(self.role.as_deref())?.unwrap_or(current.role),
            additional_info: merge(self.additional_info, current.additional_info),
        })
    }
}

fn normalize_username(raw: &str) -> Result<String, ApiError> {
    UserInput::normalize_username(raw).map_err(|e| ApiError::invalid_field("telegram_username", e.to_string()))
}

fn parse_role(raw: Option<&str>) -> Result<Option<Role>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: UnknownRole| ApiError::invalid_field("role", e.to_string())),
    }
}

fn optional(raw: &str) -> Option<String> {
    let s = raw.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn merge(incoming: Option<String>, current: Option<String>) -> Option<String> {
    match incoming {
        Some(value) => optional(&value),
        None => current,
    }
}

/// GET /admin/users
pub async fn list(State(state): State<AppState>) -> ApiResult<Value> {
    let users = state.store.list_users().await?;
    Ok(ApiResponse::success(json!({ "users": users })))
}

/// POST /admin/user
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<UserBody>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let input = body.into_new()?;

    let user = state
        .store
        .create_user(&input)
        .await
        .map_err(unique_as(USERNAME_TAKEN))?;

    tracing::info!(user_id = user.id, role = %user.role, "Created user");
    Ok(ApiResponse::created(json!({ "user": user })))
}

/// POST /admin/user/:id
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UserBody>, JsonRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    let Json(body) = body?;

    let current = state.store.get_user(id).await?.ok_or_else(user_not_found)?;
    let input = body.merge_into(current)?;

    let user = state
        .store
        .update_user(id, &input)
        .await
        .map_err(unique_as(USERNAME_TAKEN))?
        .ok_or_else(user_not_found)?;

    Ok(ApiResponse::success(json!({ "user": user })))
}

/// DELETE /admin/user/:id - Any user but the caller
pub async fn remove(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    if id == caller.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    if !state.store.delete_user(id).await? {
        return Err(user_not_found());
    }

    tracing::info!(user_id = id, deleted_by = caller.id, "Deleted user");
    Ok(ApiResponse::success(json!({ "deleted": id })))
}

fn user_not_found() -> ApiError {
    ApiError::not_found("User not found")
}
