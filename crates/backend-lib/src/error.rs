// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::AuthError;
use crate::media::MediaError;
use crate::storage::StoreError;
use crate::validation::ValidationError;

const AUTH_FAILED: &str = "Authentication failed";

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(err) => match err {
                AuthError::Unauthenticated
                | AuthError::InvalidAccessToken
                | AuthError::InvalidRefreshToken
                | AuthError::RefreshTokenReused
                | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::IncorrectPassword => StatusCode::BAD_REQUEST,
                AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AuthError::IdentityNotFound(_) | AuthError::TokenIssue(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                },
            },
            AppError::Validation(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::Duplicate(_)) | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            },
            AppError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Media(MediaError::Upload(_)) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::Media(MediaError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(err) => match err {
                AuthError::Unauthenticated
                | AuthError::InvalidAccessToken
                | AuthError::InvalidRefreshToken
                | AuthError::RefreshTokenReused
                | AuthError::InvalidCredentials => "AUTH_001",
                AuthError::IncorrectPassword => "AUTH_002",
                AuthError::IdentityNotFound(_) => "AUTH_003",
                AuthError::StoreUnavailable(_) => "STORE_001",
                AuthError::TokenIssue(_) => "INT_002",
            },
            AppError::Validation(_) => "VAL_001",
            AppError::InvalidInput(_) => "VAL_002",
            AppError::Store(StoreError::Unavailable(_)) => "STORE_001",
            AppError::Store(StoreError::Duplicate(_)) | AppError::Conflict(_) => "CONFLICT_001",
            AppError::Store(_) => "STORE_002",
            AppError::Media(_) => "MEDIA_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Auth(err) => match err {
                AuthError::IncorrectPassword => "Invalid old password".to_string(),
                AuthError::StoreUnavailable(_) => {
                    "Service temporarily unavailable, please try again later".to_string()
                },
                AuthError::IdentityNotFound(_) | AuthError::TokenIssue(_) => {
                    "An internal server error occurred".to_string()
                },
                _ => AUTH_FAILED.to_string(),
            },
            // Validation messages only echo what the client sent
            AppError::Validation(err) => err.to_string(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Store(StoreError::Duplicate(_)) => {
                "User with email or username already exists".to_string()
            },
            AppError::Store(StoreError::Unavailable(_)) => {
                "Service temporarily unavailable, please try again later".to_string()
            },
            AppError::Media(MediaError::Upload(_)) => "File upload failed".to_string(),
            AppError::NotFound(_) | AppError::Media(MediaError::NotFound(_)) => {
                "Resource not found".to_string()
            },
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::Json(_) => "Invalid request format".to_string(),
            _ => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Token rejections never carry detail to the client, even in development
        let message = if cfg!(debug_assertions) && !matches!(self, AppError::Auth(_)) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
