//! Envelope encrypt/decrypt of secret values
//!
//! The stored record keeps five columns next to the value: `enc` (0/1),
//! `value_nonce`, `wrapped_dek`, `wrap_nonce` and `kek_id`. All binary
//! fields are base64. A DEK exists in memory only for the duration of one
//! encrypt or decrypt call and is zeroed afterwards.

use crate::error::{CryptoError, CryptoResult};
use crate::keyring::{Keyring, KEY_SIZE};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// An encrypted secret value as stored at rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    /// 1 when the record is envelope-encrypted, 0 for plaintext rows
    pub enc: i64,

    /// Id of the KEK wrapping the DEK
    pub kek_id: String,

    /// base64 of the AEAD-sealed value
    pub ciphertext: String,

    /// base64 of the nonce used for the value
    pub nonce: String,

    /// base64 of the AEAD-sealed DEK
    pub wrapped_dek: String,

    /// base64 of the nonce used to wrap the DEK
    pub wrap_nonce: String,
}

/// Envelope encryption engine over an immutable keyring.
#[derive(Clone)]
pub struct Envelope {
    keyring: Arc<Keyring>,
}

impl Envelope {
    /// Create an engine bound to a loaded keyring
    pub fn new(keyring: Arc<Keyring>) -> Self {
        Self { keyring }
    }

    /// The keyring this engine resolves KEK ids against
    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Encrypt a secret value for storage at `(key, version)`.
    ///
    /// Draws a fresh random DEK, seals the value under it, then wraps the
    /// DEK under the currently active KEK. Both seals carry
    /// position-binding AAD.
    pub fn encrypt(&self, key: &str, version: i64, plaintext: &[u8]) -> CryptoResult<EncryptedValue> {
        let kek_id = self.keyring.active_id().to_string();
        let kek = self
            .keyring
            .get(&kek_id)
            .ok_or_else(|| CryptoError::UnknownKek(kek_id.clone()))?;

        // DEK per secret version
        let mut dek = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(dek.as_mut());

        let (ciphertext, nonce) = gcm_seal(dek.as_ref(), &aad(key, version, "val"), plaintext)?;
        let (wrapped, wrap_nonce) = gcm_seal(kek.as_bytes(), &aad(key, version, "dek"), dek.as_ref())?;

        Ok(EncryptedValue {
            enc: 1,
            kek_id,
            ciphertext: BASE64.encode(ciphertext),
            nonce: BASE64.encode(nonce),
            wrapped_dek: BASE64.encode(wrapped),
            wrap_nonce: BASE64.encode(wrap_nonce),
        })
    }

    /// Decrypt a stored record back to the plaintext value.
    ///
    /// Any failure (unknown KEK, bad base64, AEAD open failure, wrong DEK
    /// size) surfaces unchanged; callers treat it as a hard error.
    pub fn decrypt(&self, key: &str, version: i64, ev: &EncryptedValue) -> CryptoResult<Vec<u8>> {
        let kek = self
            .keyring
            .get(&ev.kek_id)
            .ok_or_else(|| CryptoError::UnknownKek(ev.kek_id.clone()))?;

        let wrapped = decode_field("wrapped_dek", &ev.wrapped_dek)?;
        let wrap_nonce = decode_field("wrap_nonce", &ev.wrap_nonce)?;

        let dek = Zeroizing::new(gcm_open(
            kek.as_bytes(),
            &aad(key, version, "dek"),
            &wrap_nonce,
            &wrapped,
        )?);
        if dek.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "unwrapped dek has length {}",
                dek.len()
            )));
        }

        let ciphertext = decode_field("ciphertext", &ev.ciphertext)?;
        let nonce = decode_field("nonce", &ev.nonce)?;

        gcm_open(&dek, &aad(key, version, "val"), &nonce, &ciphertext)
    }

    /// Re-wrap the DEK of an existing record under a different KEK.
    ///
    /// The value ciphertext is left untouched; its AAD binds it to
    /// `(key, version)`, not to the KEK. Rewrapping onto the same KEK id
    /// returns the input unchanged.
    pub fn rewrap_dek(
        &self,
        key: &str,
        version: i64,
        ev: EncryptedValue,
        new_kek_id: &str,
    ) -> CryptoResult<EncryptedValue> {
        if ev.enc != 1 {
            return Err(CryptoError::RewrapFailed(format!(
                "enc={} (expected 1)",
                ev.enc
            )));
        }
        if ev.kek_id.is_empty() {
            return Err(CryptoError::RewrapFailed("empty kek_id".to_string()));
        }
        if new_kek_id.is_empty() {
            return Err(CryptoError::RewrapFailed("empty new kek_id".to_string()));
        }
        if ev.kek_id == new_kek_id {
            return Ok(ev);
        }

        let old_kek = self
            .keyring
            .get(&ev.kek_id)
            .ok_or_else(|| CryptoError::UnknownKek(ev.kek_id.clone()))?;
        let new_kek = self
            .keyring
            .get(new_kek_id)
            .ok_or_else(|| CryptoError::UnknownKek(new_kek_id.to_string()))?;

        let wrapped = decode_field("wrapped_dek", &ev.wrapped_dek)?;
        let wrap_nonce = decode_field("wrap_nonce", &ev.wrap_nonce)?;

        let dek = Zeroizing::new(gcm_open(
            old_kek.as_bytes(),
            &aad(key, version, "dek"),
            &wrap_nonce,
            &wrapped,
        )?);
        if dek.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "unwrapped dek has length {}",
                dek.len()
            )));
        }

        let (new_wrapped, new_wrap_nonce) =
            gcm_seal(new_kek.as_bytes(), &aad(key, version, "dek"), &dek)?;

        Ok(EncryptedValue {
            kek_id: new_kek_id.to_string(),
            wrapped_dek: BASE64.encode(new_wrapped),
            wrap_nonce: BASE64.encode(new_wrap_nonce),
            ..ev
        })
    }
}

/// Deterministic AAD binding ciphertext to its record position.
/// `purpose` distinguishes the value seal from the DEK wrap.
fn aad(key: &str, version: i64, purpose: &str) -> Vec<u8> {
    format!("glass:v1:{}:{}:{}", key, version, purpose).into_bytes()
}

fn gcm_seal(key: &[u8], aad: &[u8], plaintext: &[u8]) -> CryptoResult<(Vec<u8>, [u8; NONCE_SIZE])> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CryptoError::EncryptionFailed(format!("cipher init: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::EncryptionFailed("aead seal".to_string()))?;

    Ok((ciphertext, nonce_bytes))
}

fn gcm_open(key: &[u8], aad: &[u8], nonce: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CryptoError::DecryptionFailed(format!("cipher init: {}", e)))?;

    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed(format!(
            "invalid nonce size {}",
            nonce.len()
        )));
    }

    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed("aead open".to_string()))
}

fn decode_field(field: &'static str, value: &str) -> CryptoResult<Vec<u8>> {
    BASE64.decode(value).map_err(|e| CryptoError::Decode {
        field,
        reason: e.to_string(),
    })
}
