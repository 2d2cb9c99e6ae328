use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type, consolidating all possible errors into a single enum.
#[derive(Debug, Error)]
pub enum AppError {
    /// Represents errors originating from the database, typically from `sqlx`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents data validation errors (e.g., invalid input format).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Represents a missing or unknown `X-API-Key` header value.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Represents a free-tier session that has exhausted its daily time budget.
    #[error("Daily usage limit reached")]
    UsageLimitExceeded,

    /// Represents a lookup for a resource that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Represents a failure in an upstream service (LLM inference, OCR).
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Represents configuration-related errors (e.g., missing environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Represents unexpected internal errors that indicate a bug.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Represents errors from operations that did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(format!("Operation timed out: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Validation errors: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(format!("HTTP error: {}", err))
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Validation(format!("Multipart error: {}", err))
    }
}

/// JSON error body returned by every failing route: `{ "error": code, "message": text }`.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AppError {
    /// Machine-readable error code used in the JSON body.
    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::InvalidApiKey => "invalid_api_key",
            AppError::UsageLimitExceeded => "usage_limit",
            AppError::NotFound(_) => "not_found",
            AppError::Database(sqlx::Error::RowNotFound) => "not_found",
            AppError::Upstream(_) => "upstream",
            AppError::Timeout(_) => "timeout",
            _ => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AppError::UsageLimitExceeded => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable message. Server-side detail is not leaked for 5xx responses.
    fn message(&self) -> String {
        match self {
            AppError::Validation(m) | AppError::NotFound(m) => m.clone(),
            AppError::InvalidApiKey => "missing or unknown X-API-Key header".to_string(),
            AppError::UsageLimitExceeded => {
                "daily free usage limit reached, please sign in to continue".to_string()
            }
            AppError::Database(sqlx::Error::RowNotFound) => "resource not found".to_string(),
            AppError::Upstream(_) => "an upstream service failed to answer".to_string(),
            AppError::Timeout(_) => "the request timed out".to_string(),
            _ => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}
