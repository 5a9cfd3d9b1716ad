//! Glass Auth - Caller Authentication
//!
//! Turns the raw `Authorization` header value into an authenticated
//! [`Subject`]. Two authenticators exist: bearer tokens loaded from an
//! operator-provided file (compared in constant time), and a noop
//! authenticator for local development that admits everyone as an
//! anonymous subject.

pub mod bearer;
pub mod error;
pub mod noop;

pub use bearer::BearerAuthenticator;
pub use error::{AuthError, AuthResult};
pub use noop::NoopAuthenticator;

use glass_core::Subject;

/// Authenticates a request from its `Authorization` header value.
pub trait Authenticator: Send + Sync {
    /// Produce a subject, or fail with [`AuthError::Unauthenticated`].
    fn authenticate(&self, authorization: Option<&str>) -> AuthResult<Subject>;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
