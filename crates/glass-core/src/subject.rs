//! Authenticated caller identity

use serde::{Deserialize, Serialize};

/// An authenticated caller, produced by an authenticator at the HTTP
/// boundary and matched against policy subjects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    /// Authentication mechanism that produced this subject (e.g. `bearer`)
    pub kind: String,

    /// Subject name within that mechanism
    pub name: String,
}

impl Subject {
    /// Create a new subject
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Render the audit form `kind:name` used for `created_by` stamping
    pub fn created_by(&self) -> String {
        format!("{}:{}", self.kind, self.name)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}
