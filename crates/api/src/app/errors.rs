//! Maps the domain error taxonomy onto HTTP responses. Every handler error
//! path funnels through `CommandCenterError`, so this is the single place
//! that decides status codes and the error body shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use aether_core::CommandCenterError;

/// Builds the uniform `{"error": {"code": ..., "message": ...}}` body.
pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": {
                "code": code,
                "message": message.into(),
            }
        })),
    )
        .into_response()
}

/// `TransientDeliveryError` never reaches a handler — it only ever drives
/// the dispatcher's backoff loop — and `FatalStartupError` only ever aborts
/// process startup, so neither has a meaningful HTTP status here; both fall
/// back to 500 if one somehow surfaces.
pub fn error_to_response(err: CommandCenterError) -> Response {
    let status = match &err {
        CommandCenterError::Validation(_) => StatusCode::BAD_REQUEST,
        CommandCenterError::NotFound => StatusCode::NOT_FOUND,
        CommandCenterError::Forbidden(_) => StatusCode::FORBIDDEN,
        CommandCenterError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CommandCenterError::TransientDelivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CommandCenterError::FatalStartup(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.code(), err.to_string())
}

pub struct ApiError(pub CommandCenterError);

impl From<CommandCenterError> for ApiError {
    fn from(err: CommandCenterError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_to_response(self.0)
    }
}
