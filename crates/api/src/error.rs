use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use selfie_core::error::CoreError;
use selfie_media::store::MediaError;
use selfie_pipeline::error::GenerationError;

/// Message returned for every failed generation. Details go to the logs only.
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate selfie";

/// Message returned when the media store rejects a delete.
pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete image";

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `selfie_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The generation pipeline did not produce an image.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A direct media store call failed.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => classify_core_error(core),

            // --- Pipeline errors ---
            AppError::Generation(err) => classify_generation_error(err),

            // --- Media store errors ---
            AppError::Media(err) => {
                tracing::error!(error = %err, "Media store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "MEDIA_ERROR",
                    DELETE_FAILED_MESSAGE.to_string(),
                )
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => {
            tracing::debug!(entity, id = %id, "Entity not found");
            (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} not found"),
            )
        }
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
    }
}

/// Invalid input is the caller's fault and is reported as such. Every
/// other pipeline failure collapses into one opaque 500.
fn classify_generation_error(err: &GenerationError) -> (StatusCode, &'static str, String) {
    match err {
        GenerationError::InvalidRequest(CoreError::Validation(msg)) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        other => {
            tracing::error!(kind = other.kind(), error = %other, "Selfie generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "GENERATION_FAILED",
                GENERATION_FAILED_MESSAGE.to_string(),
            )
        }
    }
}
