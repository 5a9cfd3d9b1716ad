//! Error types for policy loading, validation, and compilation

use thiserror::Error;

/// Result type alias for policy operations
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors from the policy subsystem
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Reading the policy file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The policy file is not valid YAML
    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The document is structurally invalid
    #[error("policy: {0}")]
    Validation(String),

    /// The document cannot be compiled into lookup tables
    #[error("policy: {0}")]
    Compile(String),

    /// The file watcher could not be set up
    #[error("watcher error: {0}")]
    Watcher(String),
}

impl From<notify::Error> for PolicyError {
    fn from(err: notify::Error) -> Self {
        PolicyError::Watcher(err.to_string())
    }
}
