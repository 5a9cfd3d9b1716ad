//! Noop authenticator for local development

use crate::error::AuthResult;
use crate::Authenticator;
use glass_core::Subject;

/// Admits every request as `none:anonymous`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuthenticator;

impl Authenticator for NoopAuthenticator {
    fn authenticate(&self, _authorization: Option<&str>) -> AuthResult<Subject> {
        Ok(Subject::new("none", "anonymous"))
    }
}
