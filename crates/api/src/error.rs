use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use buildcast_core::error::CoreError;
use buildcast_pipeline::SourceError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from the orchestrator.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A source checkout operation failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
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
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::Source(source) => match source {
                SourceError::InvalidOwner(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", source.to_string())
                }
                SourceError::MissingCheckout(_) => {
                    (StatusCode::CONFLICT, "MISSING_CHECKOUT", source.to_string())
                }
                SourceError::Process(_) => (StatusCode::CONFLICT, "CONFLICT", source.to_string()),
                SourceError::Collaborator(_) | SourceError::Command { .. } => {
                    (StatusCode::BAD_GATEWAY, "SOURCE_ERROR", source.to_string())
                }
                SourceError::Io(e) => {
                    tracing::error!(error = %e, "Source I/O error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
