//! SQLite pool construction and schema migration
//!
//! The schema is additive: the base table is created with all columns,
//! and pre-existing tables from older deployments get the five envelope
//! columns added in place, defaulting to `0` / `''`.

use crate::error::{StoreError, StoreResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Base schema: primary key `(key, version)` plus the descending-version
/// index used by latest-row reads.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS secrets (
  key TEXT NOT NULL,
  version INTEGER NOT NULL,
  value TEXT NOT NULL,
  enc INTEGER NOT NULL DEFAULT 0,
  value_nonce TEXT NOT NULL DEFAULT '',
  wrapped_dek TEXT NOT NULL DEFAULT '',
  wrap_nonce TEXT NOT NULL DEFAULT '',
  kek_id TEXT NOT NULL DEFAULT '',
  created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
  created_by TEXT NOT NULL,
  PRIMARY KEY (key, version)
);

CREATE INDEX IF NOT EXISTS idx_secrets_key_version ON secrets(key, version DESC);
"#;

/// Envelope columns added to tables created before encryption existed
const ENVELOPE_COLUMNS: &[(&str, &str)] = &[
    ("enc", "ALTER TABLE secrets ADD COLUMN enc INTEGER NOT NULL DEFAULT 0"),
    (
        "value_nonce",
        "ALTER TABLE secrets ADD COLUMN value_nonce TEXT NOT NULL DEFAULT ''",
    ),
    (
        "wrapped_dek",
        "ALTER TABLE secrets ADD COLUMN wrapped_dek TEXT NOT NULL DEFAULT ''",
    ),
    (
        "wrap_nonce",
        "ALTER TABLE secrets ADD COLUMN wrap_nonce TEXT NOT NULL DEFAULT ''",
    ),
    (
        "kek_id",
        "ALTER TABLE secrets ADD COLUMN kek_id TEXT NOT NULL DEFAULT ''",
    ),
];

/// Open (creating if necessary) the SQLite database at `path`.
pub async fn open(path: &str) -> StoreResult<SqlitePool> {
    if path.trim().is_empty() {
        return Err(StoreError::Config("sqlite path is empty".to_string()));
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    tracing::info!(path = %path, "sqlite database opened");
    Ok(pool)
}

/// Create the schema and add any missing envelope columns.
pub async fn migrate(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;

    let existing: Vec<String> =
        sqlx::query_scalar("SELECT name FROM pragma_table_info('secrets')")
            .fetch_all(pool)
            .await?;

    for (column, ddl) in ENVELOPE_COLUMNS {
        if !existing.iter().any(|c| c == column) {
            tracing::info!(column = %column, "adding envelope column to secrets table");
            sqlx::query(ddl).execute(pool).await?;
        }
    }

    Ok(())
}
