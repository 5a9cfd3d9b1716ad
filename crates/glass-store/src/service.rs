//! The secret service trait and its item types

use crate::error::StoreResult;
use async_trait::async_trait;
use glass_core::RequestScope;
use serde::Serialize;

/// Metadata of the latest version of a key, without the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretMeta {
    pub key: String,
    pub version: i64,
    pub created_at: String,
    pub created_by: String,
}

/// One listing entry: the latest version of a key, value included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretItem {
    pub key: String,
    pub value: String,
    pub version: i64,
    pub created_at: String,
    pub created_by: String,
}

/// Versioned secret storage.
///
/// All implementations take the per-request [`RequestScope`] so the
/// authenticated subject reaches audit stamping without a process-global.
#[async_trait]
pub trait SecretService: Send + Sync {
    /// Latest value of `key`
    async fn get_secret(&self, scope: &RequestScope, key: &str) -> StoreResult<String>;

    /// Latest metadata of `key`, value untouched
    async fn get_secret_meta(&self, scope: &RequestScope, key: &str) -> StoreResult<SecretMeta>;

    /// Write the next version of `key`, returning its version number
    async fn put_secret(&self, scope: &RequestScope, key: &str, value: &str) -> StoreResult<i64>;

    /// Latest version of every key under `prefix`, key-ascending
    async fn list_secrets(&self, scope: &RequestScope, prefix: &str)
        -> StoreResult<Vec<SecretItem>>;
}
