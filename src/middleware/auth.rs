use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::Claims;
use crate::database::models::Role;
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
    pub telegram_username: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            role: claims.role,
            telegram_username: claims.telegram_username,
        }
    }
}

/// User gate: any valid bearer token
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Admin gate: valid bearer token with the admin role
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers())?;
    if !user.is_admin() {
        tracing::warn!(user_id = user.id, path = %request.uri().path(), "Admin route refused");
        return Err(ApiError::forbidden("Administrator role required"));
    }
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = bearer_token(headers).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    state
        .tokens
        .authenticate(Some(token))
        .map(AuthUser::from)
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))
}

/// Token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
