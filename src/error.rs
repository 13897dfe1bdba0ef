// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized. Please sign in.")]
    Unauthorized,

    #[error("Forbidden: cross-origin request rejected")]
    ForbiddenOrigin,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Token exchange failed: {0}")]
    AuthExchange(String),

    #[error("Failed to fetch user info: {0}")]
    UserInfo(String),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("{0}")]
    Append(String),

    #[error("Sheets API error: {0}")]
    SheetsApi(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body: `{error, success: false}`.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    success: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::ForbiddenOrigin => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::AuthExchange(msg) | AppError::UserInfo(msg) | AppError::Refresh(msg) => {
                tracing::error!(error = %msg, "Google OAuth error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Authentication failed".to_string(),
                )
            }
            AppError::Append(msg) | AppError::SheetsApi(msg) => {
                tracing::error!(error = %msg, "Sheets API error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Upstream spreadsheet error".to_string(),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            success: false,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
