use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Wrapper for API responses that adds the success envelope.
///
/// Object payloads are flattened next to `"status": "success"`; anything else
/// lands under `"data"`.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }

    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "status": "error",
                        "message": "Failed to serialize response data",
                        "code": "INTERNAL_SERVER_ERROR"
                    })),
                )
                    .into_response();
            }
        };

        (status, Json(envelope(data_value))).into_response()
    }
}

fn envelope(payload: Value) -> Value {
    let mut body = Map::new();
    body.insert("status".to_string(), Value::from("success"));
    match payload {
        Value::Object(fields) => {
            for (key, value) in fields {
                if key != "status" {
                    body.insert(key, value);
                }
            }
        }
        Value::Null => {}
        other => {
            body.insert("data".to_string(), other);
        }
    }
    Value::Object(body)
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
