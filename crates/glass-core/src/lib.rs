//! Glass Core - Shared Types
//!
//! Common vocabulary used across the Glass secret store workspace:
//! authenticated subjects, the per-request scope that carries a subject
//! from the HTTP boundary into the storage layer, and key normalization.

pub mod key;
pub mod scope;
pub mod subject;

pub use key::{normalize_key, normalize_prefix};
pub use scope::RequestScope;
pub use subject::Subject;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
