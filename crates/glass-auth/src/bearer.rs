//! Bearer-token authentication from an operator-provided file
//!
//! Two file formats are supported:
//!
//! 1. Single token: the whole file is one token, mapped to the subject
//!    name `webhook`.
//! 2. Multi token: one `subject=token` (or `subject:token`) per line,
//!    with `#` comments and blank lines ignored.
//!
//! The parsed map is inverted to `token -> subject name` and lookups
//! compare tokens in constant time.

use crate::error::{AuthError, AuthResult};
use crate::Authenticator;
use glass_core::Subject;
use std::collections::HashMap;
use std::path::Path;
use subtle::ConstantTimeEq;

/// Subject name for single-token files
const SINGLE_TOKEN_SUBJECT: &str = "webhook";

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticator backed by a static token file.
pub struct BearerAuthenticator {
    token_to_subject: HashMap<String, String>,
}

impl BearerAuthenticator {
    /// Load and parse a token file.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuthError::TokenFile("bearer token file is empty".to_string()));
        }

        let token_to_subject = parse_token_file(raw);
        if token_to_subject.is_empty() {
            return Err(AuthError::TokenFile(
                "no tokens found in token file".to_string(),
            ));
        }

        tracing::info!(subjects = token_to_subject.len(), "bearer tokens loaded");

        Ok(Self { token_to_subject })
    }

    /// Number of loaded tokens
    pub fn len(&self) -> usize {
        self.token_to_subject.len()
    }

    /// Whether no tokens are loaded (never true after `from_file`)
    pub fn is_empty(&self) -> bool {
        self.token_to_subject.is_empty()
    }
}

impl Authenticator for BearerAuthenticator {
    fn authenticate(&self, authorization: Option<&str>) -> AuthResult<Subject> {
        let header = authorization.ok_or(AuthError::Unauthenticated)?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthError::Unauthenticated)?
            .trim();
        if token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        for (known, subject_name) in &self.token_to_subject {
            if bool::from(known.as_bytes().ct_eq(token.as_bytes())) {
                return Ok(Subject::new("bearer", subject_name.clone()));
            }
        }

        Err(AuthError::Unauthenticated)
    }
}

impl std::fmt::Debug for BearerAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthenticator")
            .field("tokens", &self.token_to_subject.len())
            .finish()
    }
}

/// Parse a trimmed token file into `token -> subject name`.
fn parse_token_file(raw: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();

    let lines: Vec<&str> = raw.split('\n').collect();
    // Single-token shortcut
    if lines.len() == 1 && !lines[0].contains('=') && !lines[0].contains(':') {
        out.insert(lines[0].trim().to_string(), SINGLE_TOKEN_SUBJECT.to_string());
        return out;
    }

    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (subject, token) = if let Some((s, t)) = line.split_once('=') {
            (s.trim(), t.trim())
        } else if let Some((s, t)) = line.split_once(':') {
            (s.trim(), t.trim())
        } else {
            continue;
        };

        if subject.is_empty() || token.is_empty() {
            continue;
        }

        out.insert(token.to_string(), subject.to_string());
    }

    out
}
