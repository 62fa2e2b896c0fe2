//! Error types for proctor-server
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation, and the mapping onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for the proctoring service
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input: undecodable payload, missing required field
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing, expired or otherwise invalid credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid credential, wrong role or wrong resource owner
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// State conflict: duplicate session start, double finish, answer
    /// to a non-active session
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<proctor_common::Error> for Error {
    fn from(err: proctor_common::Error) -> Self {
        match err {
            proctor_common::Error::Database(e) => Error::Database(e),
            proctor_common::Error::Io(e) => Error::Internal(e.to_string()),
        }
    }
}

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Database(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Database(_) => "database_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self);
        }
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Convenience Result type using the proctor-server Error
pub type Result<T> = std::result::Result<T, Error>;
