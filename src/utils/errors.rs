//! Sistema de manejo de errores
//!
//! HTTP-edge error type. Lower layers keep their own error enums
//! (`StoreError`, `SyncError`, `NotifyError`) and are converted here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::repositories::StoreError;
use crate::services::reconciler::SyncError;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: &'static str,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::Validation { message, details } => {
                warn!("Validation error: {}", message);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorResponse {
                        success: false,
                        error: "Validation Error".to_string(),
                        message,
                        details,
                        code: "VALIDATION_ERROR",
                        retryable: false,
                    },
                )
            }

            AppError::Unauthorized(msg) => {
                warn!("Unauthorized access: {}", msg);
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse {
                        success: false,
                        error: "Unauthorized".to_string(),
                        message: msg,
                        details: None,
                        code: "UNAUTHORIZED",
                        retryable: false,
                    },
                )
            }

            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    success: false,
                    error: "Not Found".to_string(),
                    message: msg,
                    details: None,
                    code: "NOT_FOUND",
                    retryable: false,
                },
            ),

            AppError::Conflict(msg) => {
                warn!("Conflict: {}", msg);
                (
                    StatusCode::CONFLICT,
                    ErrorResponse {
                        success: false,
                        error: "Conflict".to_string(),
                        message: msg,
                        details: None,
                        code: "CONFLICT",
                        retryable: false,
                    },
                )
            }

            AppError::Storage(msg) => {
                error!("Storage error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse {
                        success: false,
                        error: "Storage Error".to_string(),
                        message: "The order store is temporarily unavailable, retry later".to_string(),
                        details: Some(json!({ "storage_error": msg })),
                        code: "STORAGE_ERROR",
                        retryable: true,
                    },
                )
            }

            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        success: false,
                        error: "Internal Server Error".to_string(),
                        message: "An unexpected error occurred".to_string(),
                        details: None,
                        code: "INTERNAL_ERROR",
                        retryable: false,
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::InvalidPayload(errors) => AppError::Validation {
                message: "The provided order payload is invalid".to_string(),
                details: Some(json!(errors)),
            },
            SyncError::Validation(message) => AppError::Validation {
                message,
                details: None,
            },
            stale @ SyncError::Stale { .. } => AppError::Conflict(stale.to_string()),
            SyncError::Storage(e) => AppError::from(e),
        }
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, key: &str) -> AppError {
    AppError::NotFound(format!("{} '{}' not found", resource, key))
}
