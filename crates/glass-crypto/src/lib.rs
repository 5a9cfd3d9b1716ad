//! Glass Crypto - Envelope Encryption
//!
//! Envelope encryption for secret values: each written version gets a fresh
//! 32-byte data encryption key (DEK), the value is sealed under the DEK and
//! the DEK is sealed under a long-lived key encryption key (KEK) from the
//! operator-managed keyring. Rewrapping re-seals only the wrapped DEK, so
//! KEK rotation never touches value ciphertext.
//!
//! AEAD primitive is AES-256-GCM with 12-byte nonces. All ciphertext is
//! bound to its logical position through deterministic additional
//! authenticated data (`glass:v1:<key>:<version>:<purpose>`), which defeats
//! swapping ciphertext between records or between a value and a wrapped DEK.

pub mod envelope;
pub mod error;
pub mod keyring;

pub use envelope::{EncryptedValue, Envelope};
pub use error::{CryptoError, CryptoResult};
pub use keyring::{Kek, Keyring, KEY_SIZE};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
