//! In-memory secret store
//!
//! Development and test backend. Keeps only the latest version per key;
//! version numbers still increment from 1 so the service contract matches
//! the SQLite backend.

use crate::error::{StoreError, StoreResult};
use crate::now_rfc3339_millis;
use crate::service::{SecretItem, SecretMeta, SecretService};
use async_trait::async_trait;
use glass_core::RequestScope;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    version: i64,
    created_at: String,
    created_by: String,
}

/// Secret store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemorySecretStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with version-1 entries
    pub fn with_seed(seed: HashMap<String, String>) -> Self {
        let now = now_rfc3339_millis();
        let entries = seed
            .into_iter()
            .map(|(key, value)| {
                (
                    key,
                    Entry {
                        value,
                        version: 1,
                        created_at: now.clone(),
                        created_by: "unknown".to_string(),
                    },
                )
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl SecretService for MemorySecretStore {
    async fn get_secret(&self, _scope: &RequestScope, key: &str) -> StoreResult<String> {
        let entries = self.entries.read();
        entries
            .get(key)
            .map(|e| e.value.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn get_secret_meta(&self, _scope: &RequestScope, key: &str) -> StoreResult<SecretMeta> {
        let entries = self.entries.read();
        entries
            .get(key)
            .map(|e| SecretMeta {
                key: key.to_string(),
                version: e.version,
                created_at: e.created_at.clone(),
                created_by: e.created_by.clone(),
            })
            .ok_or(StoreError::NotFound)
    }

    async fn put_secret(&self, scope: &RequestScope, key: &str, value: &str) -> StoreResult<i64> {
        let mut entries = self.entries.write();
        let version = entries.get(key).map(|e| e.version).unwrap_or(0) + 1;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                version,
                created_at: now_rfc3339_millis(),
                created_by: scope.created_by(),
            },
        );
        Ok(version)
    }

    async fn list_secrets(
        &self,
        _scope: &RequestScope,
        prefix: &str,
    ) -> StoreResult<Vec<SecretItem>> {
        let entries = self.entries.read();
        let mut items: Vec<SecretItem> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, e)| SecretItem {
                key: key.clone(),
                value: e.value.clone(),
                version: e.version,
                created_at: e.created_at.clone(),
                created_by: e.created_by.clone(),
            })
            .collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glass_core::Subject;

    fn scope() -> RequestScope {
        RequestScope::with_subject(Subject::new("bearer", "tester"))
    }

    #[tokio::test]
    async fn test_versions_increment_from_one() {
        let store = MemorySecretStore::new();

        assert_eq!(store.put_secret(&scope(), "demo", "hello").await.unwrap(), 1);
        assert_eq!(store.put_secret(&scope(), "demo", "world").await.unwrap(), 2);
        assert_eq!(store.get_secret(&scope(), "demo").await.unwrap(), "world");
    }

    #[tokio::test]
    async fn test_seeded_entries_are_version_one() {
        let store = MemorySecretStore::with_seed(HashMap::from([(
            "demo".to_string(),
            "hello".to_string(),
        )]));

        assert_eq!(store.get_secret(&scope(), "demo").await.unwrap(), "hello");
        let meta = store.get_secret_meta(&scope(), "demo").await.unwrap();
        assert_eq!(meta.version, 1);

        assert_eq!(store.put_secret(&scope(), "demo", "next").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_not_found() {
        let store = MemorySecretStore::new();
        assert!(matches!(
            store.get_secret(&scope(), "missing").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.get_secret_meta(&scope(), "missing").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let store = MemorySecretStore::new();
        store.put_secret(&scope(), "team-a/db", "1").await.unwrap();
        store.put_secret(&scope(), "team-a/api", "2").await.unwrap();
        store.put_secret(&scope(), "team-b/db", "3").await.unwrap();

        let items = store.list_secrets(&scope(), "team-a/").await.unwrap();
        let keys: Vec<&str> = items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["team-a/api", "team-a/db"]);
    }

    #[tokio::test]
    async fn test_put_stamps_subject() {
        let store = MemorySecretStore::new();
        store.put_secret(&scope(), "demo", "v").await.unwrap();

        let meta = store.get_secret_meta(&scope(), "demo").await.unwrap();
        assert_eq!(meta.created_by, "bearer:tester");
    }
}
