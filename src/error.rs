//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("A product with this code already exists")]
    DuplicateProductCode,

    #[error("A category with this name already exists")]
    DuplicateCategoryName,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 403 Forbidden
            AppError::PermissionDenied => (StatusCode::FORBIDDEN, "permission_denied", None),

            // 404 Not Found
            AppError::NotFound(entity) => {
                (StatusCode::NOT_FOUND, "not_found", Some(entity.to_string()))
            }

            // 409 Conflict
            AppError::DuplicateProductCode => {
                (StatusCode::CONFLICT, "duplicate_product_code", None)
            }
            AppError::DuplicateCategoryName => {
                (StatusCode::CONFLICT, "duplicate_category_name", None)
            }

            // Domain errors - every failure names the specific violated rule
            AppError::Domain(ref domain_err) => {
                use crate::domain::DomainError;
                let detail = Some(domain_err.to_string());
                match domain_err {
                    DomainError::SessionAlreadyOpen => {
                        (StatusCode::CONFLICT, "session_already_open", detail)
                    }
                    DomainError::SessionClosed => {
                        (StatusCode::BAD_REQUEST, "session_closed", detail)
                    }
                    DomainError::JustificationRequired => {
                        (StatusCode::BAD_REQUEST, "justification_required", detail)
                    }
                    DomainError::InsufficientCashOnHand { .. } => {
                        (StatusCode::BAD_REQUEST, "insufficient_cash_on_hand", detail)
                    }
                    DomainError::ProductNotFound(_) => {
                        (StatusCode::NOT_FOUND, "product_not_found", detail)
                    }
                    DomainError::InsufficientStock { .. } => {
                        (StatusCode::BAD_REQUEST, "insufficient_stock", detail)
                    }
                    DomainError::InvalidDiscount { .. } => {
                        (StatusCode::BAD_REQUEST, "invalid_discount", detail)
                    }
                    DomainError::PaymentMismatch { .. } => {
                        (StatusCode::BAD_REQUEST, "payment_mismatch", detail)
                    }
                    DomainError::InvalidCashAmount => {
                        (StatusCode::BAD_REQUEST, "invalid_cash_amount", detail)
                    }
                    DomainError::PixNotConfirmed => {
                        (StatusCode::BAD_REQUEST, "pix_not_confirmed", detail)
                    }
                    DomainError::InvalidInstallments => {
                        (StatusCode::BAD_REQUEST, "invalid_installments", detail)
                    }
                    DomainError::ReferentialConflict(_) => {
                        (StatusCode::CONFLICT, "referential_conflict", detail)
                    }
                }
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
