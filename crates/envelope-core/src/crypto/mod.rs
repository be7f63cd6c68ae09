//! Cryptographic primitives for chat envelopes
//!
//! This module provides:
//! - An injectable random/backend handle ([`CryptoBackend`])
//! - PBKDF2-HMAC-SHA256 key derivation from the shared secret
//! - AES-256-GCM sealing and opening
//! - Secure memory handling with zeroize

mod backend;
mod encryption;
mod key_derivation;
mod secure_memory;

pub use backend::{CryptoBackend, OsBackend};
pub use encryption::{open, seal, NONCE_LEN, TAG_LEN};
pub use key_derivation::{
    derive_key, generate_nonce, generate_salt, generate_shared_secret, KeyDerivationParams,
    DEFAULT_ITERATIONS, KEY_LEN, MIN_ITERATIONS, SALT_LEN,
};
pub use secure_memory::{DerivedKey, SharedSecret};

#[cfg(test)]
pub(crate) use backend::testing;
