//! API error types with proper HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use dissent_core::{DebateError, ErrorKind};
use dissent_llm::ConfigError;

use crate::sanitize::SanitizeError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Timeout")]
    Timeout,

    #[error("Validation error: {0}")]
    Validation(String),

    /// A debate session ended with an error record
    #[error(transparent)]
    Debate(#[from] DebateError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

fn debate_status(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::InputValidation => (StatusCode::BAD_REQUEST, "INPUT_VALIDATION"),
        ErrorKind::AllAgentsFailure => (StatusCode::SERVICE_UNAVAILABLE, "ALL_AGENTS_FAILED"),
        ErrorKind::RetrievalFailure => (StatusCode::SERVICE_UNAVAILABLE, "RETRIEVAL_FAILED"),
        ErrorKind::SynthesisFailure => (StatusCode::INTERNAL_SERVER_ERROR, "SYNTHESIS_FAILED"),
        ErrorKind::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            ApiError::Internal(msg) => {
                // Don't expose internal errors to clients
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                "Request timed out".to_string(),
            ),
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            ApiError::Debate(err) => {
                let kind = err.kind();
                let (status, code) = debate_status(kind);
                let message = if kind == ErrorKind::Internal {
                    tracing::error!(error = %err, "Debate failed internally");
                    "An internal error occurred".to_string()
                } else {
                    err.to_string()
                };
                details = Some(serde_json::json!({
                    "kind": kind,
                    "retryable": kind.is_retryable(),
                }));
                (status, code, message)
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("JSON error: {}", e))
    }
}

impl From<SanitizeError> for ApiError {
    fn from(e: SanitizeError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Invalid(msg) => ApiError::BadRequest(msg),
            ConfigError::MissingEnvVar(var) => {
                ApiError::ServiceUnavailable(format!("Provider not configured ({})", var))
            }
        }
    }
}
