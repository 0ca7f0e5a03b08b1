use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mongodb::error::ErrorKind;
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::cache::ConnectError;
use crate::store::StoreError;

/// MongoDB server codes for malformed operators and values
const BAD_VALUE: i32 = 2;
const FAILED_TO_PARSE: i32 = 9;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    #[must_use]
    pub const fn is_invalid_query(&self) -> bool {
        matches!(self, Self::InvalidQuery(_))
    }

    #[must_use]
    pub const fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Status code and stable error code for this error
    #[must_use]
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Connect(e) => match e {
                ConnectError::ConnectTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "connect_timeout"),
                ConnectError::ConnectionRefused(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "connection_refused")
                }
                ConnectError::AuthFailure(_) => (StatusCode::BAD_GATEWAY, "auth_failure"),
                ConnectError::InvalidTarget(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "invalid_target")
                }
                ConnectError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "invalid_query"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Database(e) if is_rejected_operation(e) => {
                (StatusCode::BAD_REQUEST, "invalid_query")
            }
            Self::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            Self::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// Message safe to return to the caller
    fn public_message(&self) -> String {
        match self {
            Self::Database(e) if is_rejected_operation(e) => match e.kind.as_ref() {
                ErrorKind::Command(cmd) => format!("Invalid query: {}", cmd.message),
                _ => "Invalid query".to_owned(),
            },
            Self::Database(_) => "Database operation failed".to_owned(),
            Self::Connect(ConnectError::Internal(_)) | Self::Config(_) | Self::Internal(_) => {
                "Internal error".to_owned()
            }
            _ => self.to_string(),
        }
    }
}

fn is_rejected_operation(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Command(cmd) if cmd.code == BAD_VALUE || cmd.code == FAILED_TO_PARSE
    )
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Validation(msg) => Self::BadRequest(msg),
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        if err.is_config() {
            Self::Config(err.to_string())
        } else {
            Self::Unauthorized(err.to_string())
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, code, error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            code: code.to_owned(),
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
