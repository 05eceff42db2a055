use std::sync::OnceLock;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;

static DEBUG_MODE: OnceLock<bool> = OnceLock::new();

/// Set once at startup from `AppConfig::debug`. Controls whether
/// `AppError::Internal`'s detail text reaches the HTTP response body.
pub fn set_debug_mode(debug: bool) {
    let _ = DEBUG_MODE.set(debug);
}

fn debug_mode() -> bool {
    *DEBUG_MODE.get().unwrap_or(&false)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                let details = debug_mode().then(|| format!("{err:#}"));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                    details,
                )
            }
        };
        (status, Json(ErrorResponse { error, details })).into_response()
    }
}
