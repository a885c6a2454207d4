use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rescue_core::error::CoreError;
use rescue_events::BusError;
use rescue_lock::LockError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors alongside the storage and
/// coordination failures a handler can surface.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `rescue_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The distributed lock guarding the operation could not be taken.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The push pipeline could not reach the message bus.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// `Retry-After` sent with lock rejections the client may simply repeat.
const LOCK_RETRY_AFTER_SECS: &str = "1";

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(err.to_string()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_later = matches!(&self, AppError::Lock(err) if err.is_retriable());
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- Coordination errors ---
            AppError::Lock(err) => match err {
                LockError::AcquisitionDenied { name } => {
                    tracing::info!(lock = %name, "Request rejected, lock busy");
                    (
                        StatusCode::CONFLICT,
                        "LOCK_BUSY",
                        "Please try again shortly".to_string(),
                    )
                }
                LockError::ServiceUnavailable { name, source } => {
                    tracing::error!(lock = %name, error = %source, "Lock service unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "LOCK_UNAVAILABLE",
                        "Lock service unavailable, please try again shortly".to_string(),
                    )
                }
                LockError::InvalidName(msg) => {
                    tracing::error!(error = %msg, "Invalid lock name");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            AppError::Bus(err) => {
                tracing::error!(error = %err, "Message bus error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "PUSH_UNAVAILABLE",
                    "Notification stream unavailable, please try again shortly".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        let mut response = (status, axum::Json(body)).into_response();
        if retry_later {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(LOCK_RETRY_AFTER_SECS));
        }
        response
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
