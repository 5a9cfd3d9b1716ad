//! Error types and HTTP status mapping for the Glass server
//!
//! Clients see only the status code and a short generic message; denial
//! reasons and internal details stay in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use glass_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for server operations
pub type ServerResult<T> = Result<T, ServerError>;

/// Main error type for the Glass server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Startup configuration problems
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing or invalid credentials
    #[error("unauthenticated")]
    Unauthenticated,

    /// The caller is authenticated but not allowed
    #[error("forbidden")]
    Forbidden,

    /// No such secret
    #[error("not found")]
    NotFound,

    /// Malformed request (missing parameter, bad JSON)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Anything the client cannot act on
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O errors (bind, listen)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error body sent to clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ServerError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short client-safe message
    fn client_message(&self) -> String {
        match self {
            ServerError::Unauthenticated => "unauthorized".to_string(),
            ServerError::Forbidden => "forbidden".to_string(),
            ServerError::NotFound => "not found".to_string(),
            ServerError::BadRequest(msg) => msg.clone(),
            _ => "internal error".to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match status {
            StatusCode::INTERNAL_SERVER_ERROR => tracing::error!("server error: {}", self),
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                tracing::debug!("client error: {}", self)
            }
            _ => tracing::warn!("request rejected: {}", self),
        }

        let body = ErrorResponse {
            error: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServerError::NotFound,
            StoreError::Forbidden { .. } => ServerError::Forbidden,
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<glass_policy::PolicyError> for ServerError {
    fn from(err: glass_policy::PolicyError) -> Self {
        ServerError::Configuration(err.to_string())
    }
}

impl From<glass_crypto::CryptoError> for ServerError {
    fn from(err: glass_crypto::CryptoError) -> Self {
        ServerError::Configuration(err.to_string())
    }
}

impl From<glass_auth::AuthError> for ServerError {
    fn from(err: glass_auth::AuthError) -> Self {
        match err {
            glass_auth::AuthError::Unauthenticated => ServerError::Unauthenticated,
            other => ServerError::Configuration(other.to_string()),
        }
    }
}
