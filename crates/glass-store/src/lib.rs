//! Glass Store - Versioned Secret Storage
//!
//! The persistent heart of the secret store: a versioned key/value table
//! where every write creates the next version of its key and reads serve
//! the latest version. Two backends implement the same service trait: a
//! SQLite store for production and an in-memory store for development and
//! tests. The [`secured::SecuredSecretStore`] wrapper enforces
//! authentication and authorization in front of either backend, and
//! [`rewrap`] re-wraps stored data keys under a new KEK in bounded
//! transactional batches.

pub mod db;
pub mod error;
pub mod memory;
pub mod rewrap;
pub mod secured;
pub mod service;
pub mod sqlite;

pub use db::{migrate, open};
pub use error::{StoreError, StoreResult};
pub use memory::MemorySecretStore;
pub use rewrap::{rewrap_kek, RewrapOptions, RewrapReport};
pub use secured::SecuredSecretStore;
pub use service::{SecretItem, SecretMeta, SecretService};
pub use sqlite::SqliteSecretStore;

use chrono::{SecondsFormat, Utc};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// RFC3339 UTC with millisecond precision, the `created_at` wire form
pub(crate) fn now_rfc3339_millis() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
