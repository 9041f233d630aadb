use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::generation::orchestrator::GenerationError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Generation(e) if e.is_configuration() => {
                tracing::error!("Generation configuration error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    e.to_string(),
                )
            }
            AppError::Generation(GenerationError::NoHealthyProvider) => {
                tracing::error!("No healthy generation provider");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "PROVIDER_UNAVAILABLE",
                    "No generation backend is currently available".to_string(),
                )
            }
            AppError::Generation(e) => {
                tracing::error!("Generation failed: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "GENERATION_FAILED",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::orchestrator::AttemptError;
    use crate::prompts::PromptError;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_each_generation_failure_maps_to_distinct_status() {
        assert_eq!(
            status_of(AppError::Generation(GenerationError::Prompt(
                PromptError::NotFound("x".to_string())
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AppError::Generation(GenerationError::NoCandidateModels)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AppError::Generation(GenerationError::NoHealthyProvider)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AppError::Generation(GenerationError::Exhausted {
                model: "m".to_string(),
                attempts: 1,
                source: AttemptError::InvalidStructuredOutput,
            })),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_validation_is_bad_request() {
        assert_eq!(
            status_of(AppError::Validation("prompt_id cannot be empty".to_string())),
            StatusCode::BAD_REQUEST
        );
    }
}
