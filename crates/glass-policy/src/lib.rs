//! Glass Policy - Declarative Authorization
//!
//! A policy document names subjects (matched against authenticated
//! identities), roles (lists of action + key-scope permissions), and
//! bindings from subjects to roles. This crate owns the full lifecycle:
//!
//! - [`model`] / [`loader`]: the document types, the YAML parser and the
//!   structural validation run before a document is adopted.
//! - [`manager`]: the hot-reload manager publishing immutable snapshots;
//!   a failed reload keeps the last known good document.
//! - [`compiled`]: one-shot compilation into lookup tables and the pure
//!   allow/deny evaluation for `(subject, action, key)`.
//! - [`runtime`]: the request-path authorizer that recompiles only when
//!   the manager publishes a new snapshot.

pub mod compiled;
pub mod error;
pub mod loader;
pub mod manager;
pub mod model;
pub mod runtime;
pub mod types;

pub use compiled::CompiledPolicy;
pub use error::{PolicyError, PolicyResult};
pub use loader::{load_from_file, validate};
pub use manager::{ManagerOptions, PolicyManager};
pub use model::{Binding, Document, Permission, PolicySubject, Role, SubjectMatch};
pub use runtime::{PolicySource, RuntimeAuthorizer};
pub use types::{Action, Authorizer, Decision};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
