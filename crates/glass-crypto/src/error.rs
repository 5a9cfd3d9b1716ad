//! Error types for keyring loading and envelope operations

use thiserror::Error;

/// Result type alias for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors from the keyring and the envelope engine.
///
/// Messages never carry plaintext or key material.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Keyring construction failed (bad directory, empty set, missing active id)
    #[error("keyring error: {0}")]
    Keyring(String),

    /// A referenced KEK id is not present in the keyring
    #[error("unknown kek_id {0:?}")]
    UnknownKek(String),

    /// Key material on disk or an unwrapped DEK has the wrong shape
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// AEAD seal failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// AEAD open failed (wrong key, tampered ciphertext, or mismatched AAD)
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Rewrap precondition violated
    #[error("rewrap failed: {0}")]
    RewrapFailed(String),

    /// A stored base64 field could not be decoded
    #[error("decode {field}: {reason}")]
    Decode {
        field: &'static str,
        reason: String,
    },

    /// I/O error while reading key files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
