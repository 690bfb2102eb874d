use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A state-machine transition was requested from an illegal source state.
    #[error("Invalid State: {0}")]
    InvalidState(String),

    /// A snapshot read failed; the current run is aborted and retried on the next trigger.
    #[error("Data Unavailable: {0}")]
    DataUnavailable(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Re-tags a store failure that happened while loading a matching snapshot.
    pub fn into_data_unavailable(self, what: &str) -> AppError {
        match self {
            AppError::Database(e) => AppError::DataUnavailable(format!("{}: {}", what, e)),
            AppError::Internal(msg) => AppError::DataUnavailable(format!("{}: {}", what, msg)),
            other => other,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg),
            AppError::DataUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Database(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
