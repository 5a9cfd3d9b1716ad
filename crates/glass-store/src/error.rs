//! Error types for storage operations

use glass_crypto::CryptoError;
use thiserror::Error;

/// Result type alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the secret store and its secured façade
#[derive(Debug, Error)]
pub enum StoreError {
    /// No version exists for the requested key
    #[error("secret not found")]
    NotFound,

    /// The caller is not allowed to perform this operation.
    /// The reason is an internal diagnostic, never sent to clients.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// Three write attempts collided with concurrent writers
    #[error("write conflict: could not allocate new version")]
    WriteConflict,

    /// An `enc=1` row was read but no envelope is configured; the server
    /// refuses rather than returning ciphertext
    #[error("encrypted row but no envelope configured")]
    EncryptedWithoutEnvelope,

    /// A stored row violates its own invariants
    #[error("corrupted row: {0}")]
    Corrupted(String),

    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Config(String),

    /// Envelope encrypt/decrypt/rewrap failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Database failure; the enclosing transaction is rolled back
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error (e.g. creating the database directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Shorthand for an authorization denial
    pub fn forbidden(reason: impl Into<String>) -> Self {
        StoreError::Forbidden {
            reason: reason.into(),
        }
    }
}
