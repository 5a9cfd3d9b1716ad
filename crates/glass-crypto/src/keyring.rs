//! KEK keyring
//!
//! Loads every key encryption key from an operator-provided directory at
//! startup. Each regular file is one KEK; its basename is the KEK id. File
//! content is either base64 of 32 bytes or exactly 32 raw bytes. The
//! keyring is immutable after construction; KEKs are created and destroyed
//! out-of-band and never written by the service.

use crate::error::{CryptoError, CryptoResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashMap;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of KEK and DEK material in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A single key encryption key. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Kek {
    bytes: [u8; KEY_SIZE],
}

impl Kek {
    /// Wrap raw key material
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for Kek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kek").field("bytes", &"[REDACTED]").finish()
    }
}

/// Immutable mapping from KEK id to key material plus the active id used
/// for new writes.
pub struct Keyring {
    active_id: String,
    keys: HashMap<String, Kek>,
}

impl Keyring {
    /// Load all KEKs from a directory.
    ///
    /// Fails if the directory holds no keys, if any file fails to parse,
    /// or if `active_id` is not among the loaded ids.
    pub fn load(dir: impl AsRef<Path>, active_id: &str) -> CryptoResult<Self> {
        let dir = dir.as_ref();
        let active_id = active_id.trim();

        if dir.as_os_str().is_empty() {
            return Err(CryptoError::Keyring("kek dir is empty".to_string()));
        }
        if active_id.is_empty() {
            return Err(CryptoError::Keyring("active kek id is empty".to_string()));
        }

        let mut keys = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            let raw = std::fs::read(entry.path())?;
            let material = parse_kek(&raw)
                .map_err(|e| CryptoError::InvalidKey(format!("kek {:?}: {}", id, e)))?;
            keys.insert(id, Kek::from_bytes(material));
        }

        if keys.is_empty() {
            return Err(CryptoError::Keyring(format!(
                "no KEKs found in {}",
                dir.display()
            )));
        }
        if !keys.contains_key(active_id) {
            return Err(CryptoError::Keyring(format!(
                "active kek id {:?} not found in {}",
                active_id,
                dir.display()
            )));
        }

        tracing::info!(
            kek_count = keys.len(),
            active = %active_id,
            "keyring loaded"
        );

        Ok(Self {
            active_id: active_id.to_string(),
            keys,
        })
    }

    /// The id used to wrap DEKs for new writes
    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    /// Look up a KEK by id
    pub fn get(&self, id: &str) -> Option<&Kek> {
        self.keys.get(id)
    }

    /// Number of loaded KEKs
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the keyring holds no keys (never true after a successful load)
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring")
            .field("active_id", &self.active_id)
            .field("kek_count", &self.keys.len())
            .finish()
    }
}

/// Parse on-disk key material: base64(32 bytes) tried first on the trimmed
/// content, then exactly 32 raw bytes.
fn parse_kek(raw: &[u8]) -> Result<[u8; KEY_SIZE], String> {
    if let Ok(text) = std::str::from_utf8(raw) {
        if let Ok(decoded) = BASE64.decode(text.trim()) {
            if decoded.len() != KEY_SIZE {
                return Err(format!(
                    "expected {} bytes after base64 decode, got {}",
                    KEY_SIZE,
                    decoded.len()
                ));
            }
            let mut out = [0u8; KEY_SIZE];
            out.copy_from_slice(&decoded);
            return Ok(out);
        }
    }

    if raw.len() == KEY_SIZE {
        let mut out = [0u8; KEY_SIZE];
        out.copy_from_slice(raw);
        return Ok(out);
    }

    Err(format!(
        "expected {} raw bytes or base64({} bytes)",
        KEY_SIZE, KEY_SIZE
    ))
}
