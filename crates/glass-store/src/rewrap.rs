//! KEK rotation batch
//!
//! Operator-triggered admin operation with no HTTP exposure and no
//! authorization: walks every `enc=1` row wrapped under the source KEK
//! and re-wraps its DEK under the target KEK. Rows are processed in
//! bounded transactions driven by a `(key, version)` cursor, so a failure
//! rolls back only the current batch and already-committed batches stand.
//! Only `wrapped_dek`, `wrap_nonce` and `kek_id` are touched.

use crate::error::{StoreError, StoreResult};
use glass_crypto::{EncryptedValue, Envelope};
use sqlx::sqlite::SqlitePool;

/// Default rows per transaction
pub const DEFAULT_BATCH_SIZE: i64 = 500;

/// Parameters for one rewrap run.
#[derive(Debug, Clone)]
pub struct RewrapOptions {
    /// KEK id currently on the rows to rewrap
    pub from_kek_id: String,

    /// KEK id to wrap under
    pub to_kek_id: String,

    /// Rows per transaction; `0` means [`DEFAULT_BATCH_SIZE`]
    pub batch_size: i64,

    /// Only count matching rows, change nothing
    pub dry_run: bool,
}

/// Outcome of a rewrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewrapReport {
    /// Rows wrapped under the source KEK when the run started
    pub matched: i64,

    /// Rows actually re-wrapped
    pub updated: i64,
}

/// Re-wrap all matching rows from one KEK to another.
pub async fn rewrap_kek(
    pool: &SqlitePool,
    envelope: &Envelope,
    options: RewrapOptions,
) -> StoreResult<RewrapReport> {
    if options.from_kek_id.is_empty() {
        return Err(StoreError::Config("from kek id is empty".to_string()));
    }
    if options.to_kek_id.is_empty() {
        return Err(StoreError::Config("to kek id is empty".to_string()));
    }
    if options.from_kek_id == options.to_kek_id {
        return Err(StoreError::Config(format!(
            "from and to KEK ids are equal ({:?})",
            options.from_kek_id
        )));
    }
    let keyring = envelope.keyring();
    if keyring.get(&options.from_kek_id).is_none() {
        return Err(StoreError::Config(format!(
            "from kek id {:?} not in keyring",
            options.from_kek_id
        )));
    }
    if keyring.get(&options.to_kek_id).is_none() {
        return Err(StoreError::Config(format!(
            "to kek id {:?} not in keyring",
            options.to_kek_id
        )));
    }

    let batch_size = if options.batch_size > 0 {
        options.batch_size
    } else {
        DEFAULT_BATCH_SIZE
    };

    let matched: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM secrets WHERE enc = 1 AND kek_id = ?")
            .bind(&options.from_kek_id)
            .fetch_one(pool)
            .await?;

    if options.dry_run {
        return Ok(RewrapReport {
            matched,
            updated: 0,
        });
    }

    let mut updated: i64 = 0;
    let mut last_key = String::new();
    let mut last_version: i64 = 0;

    loop {
        let mut tx = pool.begin().await?;

        let batch: Vec<(String, i64, String, String, String)> = sqlx::query_as(
            r#"
SELECT key, version, wrapped_dek, wrap_nonce, kek_id
FROM secrets
WHERE enc = 1
  AND kek_id = ?
  AND (key > ? OR (key = ? AND version > ?))
ORDER BY key, version
LIMIT ?
"#,
        )
        .bind(&options.from_kek_id)
        .bind(&last_key)
        .bind(&last_key)
        .bind(last_version)
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await?;

        if batch.is_empty() {
            tx.commit().await?;
            break;
        }

        for (key, version, wrapped_dek, wrap_nonce, kek_id) in batch {
            let ev = EncryptedValue {
                enc: 1,
                kek_id,
                wrapped_dek,
                wrap_nonce,
                ..Default::default()
            };

            let rewrapped = envelope
                .rewrap_dek(&key, version, ev, &options.to_kek_id)
                .map_err(|err| {
                    tracing::error!(key = %key, version, error = %err, "rewrap failed");
                    err
                })?;

            sqlx::query(
                "UPDATE secrets SET wrapped_dek = ?, wrap_nonce = ?, kek_id = ? WHERE key = ? AND version = ?",
            )
            .bind(&rewrapped.wrapped_dek)
            .bind(&rewrapped.wrap_nonce)
            .bind(&rewrapped.kek_id)
            .bind(&key)
            .bind(version)
            .execute(&mut *tx)
            .await?;

            updated += 1;
            last_key = key;
            last_version = version;
        }

        tx.commit().await?;
    }

    tracing::info!(
        matched,
        updated,
        from = %options.from_kek_id,
        to = %options.to_kek_id,
        "rewrap complete"
    );

    Ok(RewrapReport { matched, updated })
}
