//! Structured error handling with machine-readable codes.
//!
//! Every handler returns `Result<_, AppError>`; the `IntoResponse` impl maps
//! each variant to an HTTP status plus a JSON body the chat frontend can
//! branch on (notably `QUOTA_EXCEEDED` and `AI_PROVIDER_FAILED`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error response for API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,

    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Application error types with proper categorization
#[derive(Debug)]
pub enum AppError {
    // Validation errors (400)
    InvalidInput { field: String, reason: String },

    // Auth errors (401)
    NotAuthenticated,
    InvalidToken(String),

    // Not found errors (404)
    UserNotFound(String),
    HistoryNotFound(String),

    // LLM quota exhausted across the provider chain (429)
    QuotaExceeded(String),

    // Internal errors (500)
    StorageError(String),
    SerializationError(String),

    // Upstream tracker API failures (502)
    TrackerUnavailable(String),

    // Every LLM provider failed (503)
    AiProviderFailed,

    // Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl AppError {
    /// Get error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::HistoryNotFound(_) => "HISTORY_NOT_FOUND",
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::StorageError(_) => "STORAGE_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::TrackerUnavailable(_) => "TRACKER_UPSTREAM",
            Self::AiProviderFailed => "AI_PROVIDER_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,

            Self::NotAuthenticated | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,

            Self::UserNotFound(_) | Self::HistoryNotFound(_) => StatusCode::NOT_FOUND,

            Self::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,

            Self::StorageError(_) | Self::SerializationError(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            Self::TrackerUnavailable(_) => StatusCode::BAD_GATEWAY,

            Self::AiProviderFailed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get detailed error message
    ///
    /// Messages surfaced to the chat frontend are in Spanish (the product
    /// language); internal diagnostics stay in English.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::NotAuthenticated => "No autenticado".to_string(),
            Self::InvalidToken(msg) => format!("Token inválido: {msg}"),
            Self::UserNotFound(email) => format!("Usuario no encontrado: {email}"),
            Self::HistoryNotFound(session) => {
                format!("No se encontró el historial para la sesión {session}")
            }
            Self::QuotaExceeded(_) => "El asistente está temporalmente saturado.".to_string(),
            Self::StorageError(msg) => format!("Storage error: {msg}"),
            Self::SerializationError(msg) => format!("Serialization error: {msg}"),
            Self::TrackerUnavailable(msg) => format!("Tracker API unavailable: {msg}"),
            Self::AiProviderFailed => {
                "El asistente está muy ocupado. Intenta de nuevo en un minuto.".to_string()
            }
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    /// Convert to structured error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            code: self.code().to_string(),
            message: self.message(),
            details: None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// Axum IntoResponse implementation for proper HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_response();

        (status, Json(body)).into_response()
    }
}

/// Helper trait to convert validation errors
pub trait ValidationErrorExt<T> {
    fn map_validation_err(self, field: &str) -> Result<T>;
}

impl<T> ValidationErrorExt<T> for anyhow::Result<T> {
    fn map_validation_err(self, field: &str) -> Result<T> {
        self.map_err(|e| AppError::InvalidInput {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::UserNotFound("a@b.com".to_string()).code(),
            "USER_NOT_FOUND"
        );
        assert_eq!(AppError::QuotaExceeded("429".to_string()).code(), "QUOTA_EXCEEDED");
        assert_eq!(AppError::AiProviderFailed.code(), "AI_PROVIDER_FAILED");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotAuthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::QuotaExceeded("limit".to_string()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::AiProviderFailed.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::TrackerUnavailable("timeout".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let err = AppError::UserNotFound("nadie@wl.mx".to_string());
        let response = err.to_response();

        assert!(!response.success);
        assert_eq!(response.code, "USER_NOT_FOUND");
        assert!(response.message.contains("nadie@wl.mx"));
    }
}
