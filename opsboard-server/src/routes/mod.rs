pub mod collections;
pub mod health;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use opsboard_core::OpsboardError;

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Convert core errors to HTTP responses
pub struct AppError(OpsboardError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OpsboardError::UnknownCollection(_) | OpsboardError::NotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            OpsboardError::VersionConflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("request failed: {}", self.0);
        }
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<OpsboardError> for AppError {
    fn from(err: OpsboardError) -> Self {
        Self(err)
    }
}
