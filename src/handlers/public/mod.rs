// handlers/public/mod.rs - Public handlers (no authentication)
//
// Liveness and readiness checks. Neither reveals anything beyond
// reachability.

use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /ping - Liveness only, never touches the database
pub async fn ping() -> Json<Value> {
    Json(json!({
        "status": "ALIVE",
        "message": "pong",
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        "debug": "100% clean",
    }))
}

/// GET /health - Liveness plus a database round trip
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    if let Err(e) = state.store.ping().await {
        tracing::error!(error = %e, "Health check failed");
        return Err(ApiError::service_unavailable("Database unavailable"));
    }

    Ok(ApiResponse::success(json!({
        "database": "ok",
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })))
}
