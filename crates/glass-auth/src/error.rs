//! Error types for authentication

use thiserror::Error;

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors from authenticators
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed, or unknown credentials
    #[error("unauthenticated")]
    Unauthenticated,

    /// The token file could not be used
    #[error("token file error: {0}")]
    TokenFile(String),

    /// I/O error while reading the token file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
