//! Policy document model
//!
//! The on-disk shape (YAML):
//!
//! ```yaml
//! api_version: "glass.secretstore/v1alpha1"
//! kind: "Policy"
//! subjects:
//!   - name: team-a
//!     match: { kind: bearer, name: team-a-token }
//! roles:
//!   - name: team-a-reader
//!     permissions:
//!       - action: read
//!         key_prefix: "team-a/"
//! bindings:
//!   - subject: team-a
//!     roles: [team-a-reader]
//! ```
//!
//! Field aliases (`apiVersion`, `keyPrefix`, `keyExact`) are accepted for
//! documents written in the camelCase convention of mounted Kubernetes
//! manifests.

use serde::{Deserialize, Serialize};

/// One immutable policy snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Schema version, e.g. `glass.secretstore/v1alpha1`
    #[serde(default, alias = "apiVersion")]
    pub api_version: String,

    /// Document kind, `Policy`
    #[serde(default)]
    pub kind: String,

    /// Optional document metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Named subject entries
    #[serde(default)]
    pub subjects: Vec<PolicySubject>,

    /// Named roles
    #[serde(default)]
    pub roles: Vec<Role>,

    /// Subject-to-roles bindings
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

/// Document metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
}

/// A policy subject: a local alias plus the identity it matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySubject {
    /// Local alias referenced by bindings
    #[serde(default)]
    pub name: String,

    /// The authenticated identity this subject matches
    #[serde(default, rename = "match")]
    pub matcher: SubjectMatch,
}

/// Identity match: both fields are required by validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectMatch {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,
}

/// A named role carrying permissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// One permission: an action scoped to a key prefix or an exact key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permission {
    /// `read`, `write` or `list` (case-insensitive)
    #[serde(default)]
    pub action: String,

    /// Key prefix scope; must end with `/` when present
    #[serde(default, alias = "keyPrefix")]
    pub key_prefix: String,

    /// Exact key scope
    #[serde(default, alias = "keyExact")]
    pub key_exact: String,
}

/// Binds a subject alias to a list of role names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Binding {
    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub roles: Vec<String>,
}
