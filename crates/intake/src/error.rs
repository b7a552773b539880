use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use uuid::Uuid;

/// Fatal errors raised while bootstrapping the service.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

/// Request-level error taxonomy returned by the submission API.
///
/// Every variant maps to a stable `{error}` envelope; validation failures
/// carry the full field-error list as `{errors}` so clients can fix all
/// fields at once. Internal detail is never leaked: dependency failures
/// surface only a correlation id for support reference.
#[derive(Debug)]
pub enum ApiError {
    Validation(Vec<String>),
    BadRequest(String),
    Unauthenticated,
    Forbidden,
    NotFound(String),
    RateLimited,
    Dependency { request_id: Uuid },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(errors) => write!(f, "validation failed: {}", errors.join("; ")),
            ApiError::BadRequest(message) => write!(f, "{message}"),
            ApiError::Unauthenticated => write!(f, "authentication required"),
            ApiError::Forbidden => write!(f, "insufficient permissions"),
            ApiError::NotFound(message) => write!(f, "{message}"),
            ApiError::RateLimited => write!(f, "rate limit exceeded"),
            ApiError::Dependency { request_id } => {
                write!(f, "dependency failure (request {request_id})")
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
            }
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authentication required" })),
            )
                .into_response(),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Insufficient permissions" })),
            )
                .into_response(),
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Too many requests. Please try again later." })),
            )
                .into_response(),
            ApiError::Dependency { request_id } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "An error occurred processing your request",
                    "requestId": request_id,
                })),
            )
                .into_response(),
        }
    }
}
