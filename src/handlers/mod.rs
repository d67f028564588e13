// src/handlers/mod.rs
pub mod agent;
pub mod auth;
pub mod messages;
pub mod realtime;
pub mod session;
pub mod settings;
pub mod status;
pub mod typing;

use crate::models::auth::ErrorResponse;
use axum::{http::StatusCode, response::Json};

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            message: message.to_string(),
        }),
    )
}

/// Logs the underlying error and returns a generic 500. The detail is only
/// exposed in development builds.
pub fn internal_error(context: &str, err: impl std::fmt::Display) -> ApiError {
    tracing::error!("{}: {}", context, err);
    let message = if cfg!(debug_assertions) {
        format!("Internal server error: {}", err)
    } else {
        "Internal server error".to_string()
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            success: false,
            message,
        }),
    )
}
