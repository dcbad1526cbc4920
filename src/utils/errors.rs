//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del sistema
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::OrderStatus;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        allowed: Vec<OrderStatus>,
    },

    #[error("Invalid state: {message}")]
    InvalidState {
        message: String,
        current: Option<OrderStatus>,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Bulk update rejected: {} order(s) failed validation", .0.len())]
    BulkRejected(Vec<BulkFailure>),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Orden que no pasó la validación de una actualización masiva
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkFailure {
    pub order_id: Uuid,
    pub current_status: Option<OrderStatus>,
    pub reason: String,
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl ErrorResponse {
    fn new(error: &str, message: String, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message,
            details: None,
            code: Some(code.to_string()),
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::Database(e) => {
                tracing::error!("❌ Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "Database Error",
                        "An error occurred while accessing the database".to_string(),
                        "DB_ERROR",
                    ),
                )
            }

            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "Validation Error",
                    "The provided data is invalid".to_string(),
                    "VALIDATION_ERROR",
                )
                .with_details(json!(e)),
            ),

            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("Not Found", msg, "NOT_FOUND"),
            ),

            AppError::InvalidArgument(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("Invalid Argument", msg, "INVALID_ARGUMENT"),
            ),

            AppError::InvalidTransition { from, to, allowed } => (
                StatusCode::CONFLICT,
                ErrorResponse::new(
                    "Invalid Transition",
                    format!("Cannot move order from {} to {}", from, to),
                    "INVALID_TRANSITION",
                )
                .with_details(json!({
                    "current_status": from,
                    "requested_status": to,
                    "allowed_statuses": allowed,
                })),
            ),

            AppError::InvalidState { message, current } => (
                StatusCode::CONFLICT,
                ErrorResponse::new("Invalid State", message, "INVALID_STATE")
                    .with_details(json!({ "current_status": current })),
            ),

            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorResponse::new("Conflict", msg, "CONFLICT"),
            ),

            AppError::PreconditionFailed(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("Precondition Failed", msg, "PRECONDITION_FAILED"),
            ),

            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("Forbidden", msg, "FORBIDDEN"),
            ),

            AppError::UpstreamUnavailable(msg) => {
                tracing::warn!("⚠️ Upstream unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new(
                        "Service Unavailable",
                        "An upstream service is temporarily unavailable".to_string(),
                        "UPSTREAM_UNAVAILABLE",
                    ),
                )
            }

            AppError::BulkRejected(failures) => (
                StatusCode::CONFLICT,
                ErrorResponse::new(
                    "Bulk Update Rejected",
                    format!("{} order(s) cannot take the requested status", failures.len()),
                    "BULK_REJECTED",
                )
                .with_details(json!({ "failures": failures })),
            ),

            AppError::Internal(msg) => {
                tracing::error!("❌ Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "Internal Server Error",
                        "An unexpected error occurred".to_string(),
                        "INTERNAL_ERROR",
                    ),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de conflicto
pub fn conflict_error(resource: &str, field: &str, value: &str) -> AppError {
    AppError::Conflict(format!("{} with {} '{}' already exists", resource, field, value))
}

/// Función helper para crear errores de acceso prohibido
pub fn forbidden_error(operation: &str, reason: &str) -> AppError {
    AppError::Forbidden(format!("Cannot {}: {}", operation, reason))
}

/// Función helper para crear errores de argumento inválido
pub fn invalid_argument(message: impl Into<String>) -> AppError {
    AppError::InvalidArgument(message.into())
}

/// Detectar violaciones de unicidad de Postgres (SQLSTATE 23505)
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.code().as_deref() == Some("23505"),
        _ => false,
    }
}
