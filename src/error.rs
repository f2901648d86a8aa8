use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::api::Verb;

/// AppError
///
/// Request-level failures. API handlers return these directly and they render
/// as `{"error": "..."}`; page handlers match on `Conflict`/`Auth` and re-render
/// the form instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Username taken")]
    Conflict,

    #[error("Invalid credentials")]
    Auth,

    #[error("Forbidden")]
    Forbidden,

    #[error("API not found")]
    NotFound,

    #[error("Method {} not allowed for this API.", .0.as_str().to_uppercase())]
    MethodNotAllowed(Verb),

    #[error("{0}")]
    BadRequest(String),

    #[error("Request body too large.")]
    PayloadTooLarge,

    /// Raised inside an API module handler; only the message is returned.
    #[error("{0}")]
    Handler(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Auth => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Handler(_) | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// ErrorBody
///
/// JSON envelope for every API-level failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = %status, "request failed: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// RepoError
///
/// Failures of repository writes. Reads log their errors and return empty results.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("unique constraint violated")]
    Conflict,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Conflict => AppError::Conflict,
            RepoError::Database(e) => {
                tracing::error!("repository error: {:?}", e);
                AppError::Internal
            }
        }
    }
}
