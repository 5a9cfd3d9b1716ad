//! Server configuration from environment variables
//!
//! | Variable | Default | Notes |
//! |---|---|---|
//! | `HTTP_ADDR` | `0.0.0.0` | bind address |
//! | `HTTP_PORT` | `8080` | |
//! | `AUTH_MODE` | `bearer` | `bearer` or `noop` |
//! | `AUTH_TOKEN_FILE` | (none) | required for bearer mode |
//! | `POLICY_FILE` | (none) | required |
//! | `STORAGE_BACKEND` | `sqlite` | `sqlite` or `memory` |
//! | `SQLITE_PATH` | `./data/glass.db` | |
//! | `ENCRYPTION_MODE` | `none` | `none` or `envelope` |
//! | `KEK_DIR` | (none) | required for envelope mode |
//! | `ACTIVE_KEK_ID` | (none) | required for envelope mode |

use crate::error::{ServerError, ServerResult};
use std::path::PathBuf;

/// How callers are authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Bearer tokens from `AUTH_TOKEN_FILE`
    Bearer,
    /// Everyone is `none:anonymous` (development only)
    Noop,
}

/// Which secret store backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// Whether values are envelope-encrypted at rest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    None,
    Envelope,
}

/// Main server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub http_addr: String,

    /// Bind port
    pub http_port: u16,

    /// Authentication mode
    pub auth_mode: AuthMode,

    /// Bearer token file (bearer mode)
    pub auth_token_file: Option<PathBuf>,

    /// Policy document path
    pub policy_file: PathBuf,

    /// Storage backend
    pub storage_backend: StorageBackend,

    /// SQLite database path (sqlite backend)
    pub sqlite_path: String,

    /// Encryption mode
    pub encryption_mode: EncryptionMode,

    /// KEK directory (envelope mode)
    pub kek_dir: Option<PathBuf>,

    /// Active KEK id (envelope mode)
    pub active_kek_id: String,
}

impl ServerConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_addr = get("HTTP_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
        let http_port = match get("HTTP_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                ServerError::Configuration(format!("invalid HTTP_PORT {:?}", raw))
            })?,
            None => 8080,
        };

        let auth_mode = match get("AUTH_MODE").as_deref() {
            None | Some("bearer") => AuthMode::Bearer,
            Some("noop") => AuthMode::Noop,
            Some(other) => {
                return Err(ServerError::Configuration(format!(
                    "invalid AUTH_MODE {:?} (expected bearer or noop)",
                    other
                )))
            }
        };
        let auth_token_file = get("AUTH_TOKEN_FILE").map(PathBuf::from);
        if auth_mode == AuthMode::Bearer && auth_token_file.is_none() {
            return Err(ServerError::Configuration(
                "AUTH_TOKEN_FILE is required when AUTH_MODE=bearer".to_string(),
            ));
        }

        let policy_file = get("POLICY_FILE").map(PathBuf::from).ok_or_else(|| {
            ServerError::Configuration("POLICY_FILE is required".to_string())
        })?;

        let storage_backend = match get("STORAGE_BACKEND").as_deref() {
            None | Some("sqlite") => StorageBackend::Sqlite,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ServerError::Configuration(format!(
                    "invalid STORAGE_BACKEND {:?} (expected sqlite or memory)",
                    other
                )))
            }
        };
        let sqlite_path = get("SQLITE_PATH").unwrap_or_else(|| "./data/glass.db".to_string());

        let encryption_mode = match get("ENCRYPTION_MODE").as_deref() {
            None | Some("none") => EncryptionMode::None,
            Some("envelope") => EncryptionMode::Envelope,
            Some(other) => {
                return Err(ServerError::Configuration(format!(
                    "invalid ENCRYPTION_MODE {:?} (expected none or envelope)",
                    other
                )))
            }
        };
        let kek_dir = get("KEK_DIR").map(PathBuf::from);
        let active_kek_id = get("ACTIVE_KEK_ID").unwrap_or_default();

        if encryption_mode == EncryptionMode::Envelope {
            if kek_dir.is_none() {
                return Err(ServerError::Configuration(
                    "KEK_DIR is required when ENCRYPTION_MODE=envelope".to_string(),
                ));
            }
            if active_kek_id.is_empty() {
                return Err(ServerError::Configuration(
                    "ACTIVE_KEK_ID is required when ENCRYPTION_MODE=envelope".to_string(),
                ));
            }
            if storage_backend == StorageBackend::Memory {
                return Err(ServerError::Configuration(
                    "ENCRYPTION_MODE=envelope requires STORAGE_BACKEND=sqlite".to_string(),
                ));
            }
        }

        Ok(Self {
            http_addr,
            http_port,
            auth_mode,
            auth_token_file,
            policy_file,
            storage_backend,
            sqlite_path,
            encryption_mode,
            kek_dir,
            active_kek_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerResult<ServerConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config_from(&[
            ("POLICY_FILE", "/etc/glass/policy.yaml"),
            ("AUTH_MODE", "noop"),
        ])
        .unwrap();

        assert_eq!(cfg.http_addr, "0.0.0.0");
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.storage_backend, StorageBackend::Sqlite);
        assert_eq!(cfg.sqlite_path, "./data/glass.db");
        assert_eq!(cfg.encryption_mode, EncryptionMode::None);
    }

    #[test]
    fn test_policy_file_is_required() {
        assert!(matches!(
            config_from(&[("AUTH_MODE", "noop")]),
            Err(ServerError::Configuration(_))
        ));
    }

    #[test]
    fn test_bearer_requires_token_file() {
        assert!(config_from(&[("POLICY_FILE", "p.yaml")]).is_err());

        let cfg = config_from(&[
            ("POLICY_FILE", "p.yaml"),
            ("AUTH_TOKEN_FILE", "/etc/glass/token"),
        ])
        .unwrap();
        assert_eq!(cfg.auth_mode, AuthMode::Bearer);
    }

    #[test]
    fn test_envelope_requires_kek_settings() {
        let base = [
            ("POLICY_FILE", "p.yaml"),
            ("AUTH_MODE", "noop"),
            ("ENCRYPTION_MODE", "envelope"),
        ];
        assert!(config_from(&base).is_err());

        let cfg = config_from(&[
            ("POLICY_FILE", "p.yaml"),
            ("AUTH_MODE", "noop"),
            ("ENCRYPTION_MODE", "envelope"),
            ("KEK_DIR", "/etc/glass/keks"),
            ("ACTIVE_KEK_ID", "default"),
        ])
        .unwrap();
        assert_eq!(cfg.encryption_mode, EncryptionMode::Envelope);
        assert_eq!(cfg.active_kek_id, "default");
    }

    #[test]
    fn test_envelope_rejects_memory_backend() {
        assert!(config_from(&[
            ("POLICY_FILE", "p.yaml"),
            ("AUTH_MODE", "noop"),
            ("ENCRYPTION_MODE", "envelope"),
            ("KEK_DIR", "/etc/glass/keks"),
            ("ACTIVE_KEK_ID", "default"),
            ("STORAGE_BACKEND", "memory"),
        ])
        .is_err());
    }

    #[test]
    fn test_invalid_enums_rejected() {
        assert!(config_from(&[("POLICY_FILE", "p"), ("AUTH_MODE", "jwt")]).is_err());
        assert!(config_from(&[
            ("POLICY_FILE", "p"),
            ("AUTH_MODE", "noop"),
            ("STORAGE_BACKEND", "postgres")
        ])
        .is_err());
        assert!(config_from(&[
            ("POLICY_FILE", "p"),
            ("AUTH_MODE", "noop"),
            ("HTTP_PORT", "eighty")
        ])
        .is_err());
    }
}
