//! SQLite-backed secret store
//!
//! Versions are allocated inside a transaction and serialized through the
//! `(key, version)` primary key: a concurrent writer that claims the same
//! version loses the insert with a uniqueness violation and the loop
//! retries with a fresh `MAX(version)`.

use crate::error::{StoreError, StoreResult};
use crate::now_rfc3339_millis;
use crate::service::{SecretItem, SecretMeta, SecretService};
use async_trait::async_trait;
use glass_core::RequestScope;
use glass_crypto::{EncryptedValue, Envelope};
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

/// Attempts before a write is reported as conflicted
const PUT_ATTEMPTS: usize = 3;

#[derive(Debug, sqlx::FromRow)]
struct SecretRow {
    key: String,
    version: i64,
    value: String,
    enc: i64,
    value_nonce: String,
    wrapped_dek: String,
    wrap_nonce: String,
    kek_id: String,
    created_at: String,
    created_by: String,
}

/// Secret store backed by SQLite, optionally envelope-encrypting values.
pub struct SqliteSecretStore {
    pool: SqlitePool,
    envelope: Option<Arc<Envelope>>,
}

impl SqliteSecretStore {
    /// Plaintext store over a migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            envelope: None,
        }
    }

    /// Store that encrypts new values and decrypts on read
    pub fn with_envelope(pool: SqlitePool, envelope: Arc<Envelope>) -> Self {
        Self {
            pool,
            envelope: Some(envelope),
        }
    }

    async fn latest_row(&self, key: &str) -> StoreResult<SecretRow> {
        let row: Option<SecretRow> = sqlx::query_as(
            r#"
SELECT key, version, value, enc, value_nonce, wrapped_dek, wrap_nonce, kek_id, created_at, created_by
FROM secrets
WHERE key = ?
ORDER BY version DESC
LIMIT 1
"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(StoreError::NotFound)
    }

    /// Turn a stored row into its plaintext value.
    ///
    /// An `enc=1` row without a configured envelope is a configuration
    /// failure; ciphertext is never handed to callers.
    fn decode_value(&self, row: &SecretRow) -> StoreResult<String> {
        if row.enc == 0 {
            return Ok(row.value.clone());
        }

        let envelope = self
            .envelope
            .as_ref()
            .ok_or(StoreError::EncryptedWithoutEnvelope)?;

        let ev = EncryptedValue {
            enc: row.enc,
            kek_id: row.kek_id.clone(),
            ciphertext: row.value.clone(),
            nonce: row.value_nonce.clone(),
            wrapped_dek: row.wrapped_dek.clone(),
            wrap_nonce: row.wrap_nonce.clone(),
        };

        let plaintext = envelope.decrypt(&row.key, row.version, &ev)?;
        String::from_utf8(plaintext)
            .map_err(|_| StoreError::Corrupted("decrypted value is not valid UTF-8".to_string()))
    }
}

#[async_trait]
impl SecretService for SqliteSecretStore {
    async fn get_secret(&self, _scope: &RequestScope, key: &str) -> StoreResult<String> {
        let row = self.latest_row(key).await?;
        self.decode_value(&row)
    }

    async fn get_secret_meta(&self, _scope: &RequestScope, key: &str) -> StoreResult<SecretMeta> {
        let row: Option<(String, i64, String, String)> = sqlx::query_as(
            r#"
SELECT key, version, created_at, created_by
FROM secrets
WHERE key = ?
ORDER BY version DESC
LIMIT 1
"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let (key, version, created_at, created_by) = row.ok_or(StoreError::NotFound)?;
        Ok(SecretMeta {
            key,
            version,
            created_at,
            created_by,
        })
    }

    async fn put_secret(&self, scope: &RequestScope, key: &str, value: &str) -> StoreResult<i64> {
        let created_by = scope.created_by();

        for _attempt in 0..PUT_ATTEMPTS {
            let mut tx = self.pool.begin().await?;

            let max: Option<i64> =
                sqlx::query_scalar("SELECT MAX(version) FROM secrets WHERE key = ?")
                    .bind(key)
                    .fetch_one(&mut *tx)
                    .await?;
            let next = max.unwrap_or(0) + 1;
            let created_at = now_rfc3339_millis();

            let ev = match &self.envelope {
                Some(envelope) => envelope.encrypt(key, next, value.as_bytes())?,
                None => EncryptedValue {
                    ciphertext: value.to_string(),
                    ..Default::default()
                },
            };

            let inserted = sqlx::query(
                r#"
INSERT INTO secrets(key, version, value, enc, value_nonce, wrapped_dek, wrap_nonce, kek_id, created_at, created_by)
VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#,
            )
            .bind(key)
            .bind(next)
            .bind(&ev.ciphertext)
            .bind(ev.enc)
            .bind(&ev.nonce)
            .bind(&ev.wrapped_dek)
            .bind(&ev.wrap_nonce)
            .bind(&ev.kek_id)
            .bind(&created_at)
            .bind(&created_by)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {
                    tx.commit().await?;
                    return Ok(next);
                }
                Err(err) if is_unique_violation(&err) => {
                    // A concurrent writer claimed this version; retry
                    tx.rollback().await?;
                    continue;
                }
                Err(err) => {
                    tx.rollback().await?;
                    return Err(err.into());
                }
            }
        }

        Err(StoreError::WriteConflict)
    }

    async fn list_secrets(
        &self,
        _scope: &RequestScope,
        prefix: &str,
    ) -> StoreResult<Vec<SecretItem>> {
        let pattern = format!("{}%", escape_like(prefix));
        let rows: Vec<SecretRow> = sqlx::query_as(
            r#"
SELECT s.key, s.version, s.value, s.enc, s.value_nonce, s.wrapped_dek, s.wrap_nonce, s.kek_id, s.created_at, s.created_by
FROM secrets s
JOIN (
    SELECT key, MAX(version) AS version
    FROM secrets
    WHERE key LIKE ? ESCAPE '\'
    GROUP BY key
) latest ON latest.key = s.key AND latest.version = s.version
ORDER BY s.key ASC
"#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let value = self.decode_value(&row)?;
            items.push(SecretItem {
                key: row.key,
                value,
                version: row.version,
                created_at: row.created_at,
                created_by: row.created_by,
            });
        }
        Ok(items)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

/// Escape LIKE metacharacters so a prefix matches literally.
fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{migrate, open};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use glass_core::Subject;
    use glass_crypto::Keyring;

    async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let pool = open(path.to_str().unwrap()).await.unwrap();
        migrate(&pool).await.unwrap();
        (dir, pool)
    }

    fn test_envelope(dir: &std::path::Path) -> Arc<Envelope> {
        let keys_dir = dir.join("keys");
        std::fs::create_dir_all(&keys_dir).unwrap();
        std::fs::write(keys_dir.join("default"), BASE64.encode([0x11u8; 32])).unwrap();
        let keyring = Keyring::load(&keys_dir, "default").unwrap();
        Arc::new(Envelope::new(Arc::new(keyring)))
    }

    fn scope() -> RequestScope {
        RequestScope::with_subject(Subject::new("bearer", "tester"))
    }

    #[tokio::test]
    async fn test_put_get_versioning() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteSecretStore::new(pool);

        assert_eq!(store.put_secret(&scope(), "demo", "hello").await.unwrap(), 1);
        assert_eq!(store.get_secret(&scope(), "demo").await.unwrap(), "hello");

        assert_eq!(store.put_secret(&scope(), "demo", "world").await.unwrap(), 2);
        assert_eq!(store.get_secret(&scope(), "demo").await.unwrap(), "world");
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteSecretStore::new(pool);

        assert!(matches!(
            store.get_secret(&scope(), "missing").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_versioning_is_per_key() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteSecretStore::new(pool);

        assert_eq!(store.put_secret(&scope(), "a", "x").await.unwrap(), 1);
        assert_eq!(store.put_secret(&scope(), "b", "y").await.unwrap(), 1);
        assert_eq!(store.put_secret(&scope(), "a", "x2").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_meta_has_audit_fields() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteSecretStore::new(pool);

        store.put_secret(&scope(), "demo", "hello").await.unwrap();
        let meta = store.get_secret_meta(&scope(), "demo").await.unwrap();

        assert_eq!(meta.key, "demo");
        assert_eq!(meta.version, 1);
        assert_eq!(meta.created_by, "bearer:tester");
        assert!(meta.created_at.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_meta_unknown_subject_stamp() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteSecretStore::new(pool);

        store
            .put_secret(&RequestScope::anonymous(), "demo", "hello")
            .await
            .unwrap();
        let meta = store.get_secret_meta(&scope(), "demo").await.unwrap();
        assert_eq!(meta.created_by, "unknown");
    }

    #[tokio::test]
    async fn test_list_returns_latest_per_key_sorted() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteSecretStore::new(pool);

        store.put_secret(&scope(), "team-a/db", "v1").await.unwrap();
        store.put_secret(&scope(), "team-a/db", "v2").await.unwrap();
        store.put_secret(&scope(), "team-a/api", "apipass").await.unwrap();
        store.put_secret(&scope(), "team-b/db", "other").await.unwrap();

        let items = store.list_secrets(&scope(), "team-a/").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key, "team-a/api");
        assert_eq!(items[0].value, "apipass");
        assert_eq!(items[1].key, "team-a/db");
        assert_eq!(items[1].value, "v2");
        assert_eq!(items[1].version, 2);
    }

    #[tokio::test]
    async fn test_list_prefix_is_literal() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteSecretStore::new(pool);

        store.put_secret(&scope(), "team_a/db", "x").await.unwrap();
        store.put_secret(&scope(), "teamXa/db", "y").await.unwrap();

        // `_` must not act as a LIKE wildcard
        let items = store.list_secrets(&scope(), "team_a/").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key, "team_a/db");
    }

    #[tokio::test]
    async fn test_encryption_at_rest() {
        let (dir, pool) = test_pool().await;
        let store = SqliteSecretStore::with_envelope(pool.clone(), test_envelope(dir.path()));

        store
            .put_secret(&scope(), "demo", "super-secret")
            .await
            .unwrap();

        // Service round-trip yields plaintext
        assert_eq!(
            store.get_secret(&scope(), "demo").await.unwrap(),
            "super-secret"
        );

        // The raw row must not contain the plaintext
        let (stored, enc): (String, i64) = sqlx::query_as(
            "SELECT value, enc FROM secrets WHERE key = ? ORDER BY version DESC LIMIT 1",
        )
        .bind("demo")
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(enc, 1);
        assert!(!stored.contains("super-secret"));
    }

    #[tokio::test]
    async fn test_encrypted_row_without_envelope_refuses() {
        let (dir, pool) = test_pool().await;
        let encrypting = SqliteSecretStore::with_envelope(pool.clone(), test_envelope(dir.path()));
        encrypting.put_secret(&scope(), "demo", "s").await.unwrap();

        let plain = SqliteSecretStore::new(pool);
        assert!(matches!(
            plain.get_secret(&scope(), "demo").await,
            Err(StoreError::EncryptedWithoutEnvelope)
        ));
    }

    #[tokio::test]
    async fn test_encrypted_list_decrypts_values() {
        let (dir, pool) = test_pool().await;
        let store = SqliteSecretStore::with_envelope(pool, test_envelope(dir.path()));

        store.put_secret(&scope(), "team-a/db", "dbpass").await.unwrap();
        store.put_secret(&scope(), "team-a/api", "apipass").await.unwrap();

        let items = store.list_secrets(&scope(), "team-a/").await.unwrap();
        assert_eq!(items[0].value, "apipass");
        assert_eq!(items[1].value, "dbpass");
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_fails_closed() {
        let (dir, pool) = test_pool().await;
        let store = SqliteSecretStore::with_envelope(pool.clone(), test_envelope(dir.path()));
        store.put_secret(&scope(), "demo", "s").await.unwrap();

        sqlx::query("UPDATE secrets SET wrapped_dek = ? WHERE key = 'demo'")
            .bind(BASE64.encode([9u8; 48]))
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            store.get_secret(&scope(), "demo").await,
            Err(StoreError::Crypto(_))
        ));
    }
}
