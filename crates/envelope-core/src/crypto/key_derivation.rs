//! Shared-secret key derivation using PBKDF2-HMAC-SHA256

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use super::{CryptoBackend, DerivedKey, SharedSecret, NONCE_LEN};
use crate::error::{CryptoError, Result};

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (256 bits)
pub const KEY_LEN: usize = 32;

/// Iteration count both ends of a conversation use unless configured otherwise
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Lowest iteration count accepted
pub const MIN_ITERATIONS: u32 = 100_000;

/// Parameters for PBKDF2 key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDerivationParams {
    /// HMAC-SHA256 iterations (default: 100,000)
    pub iterations: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KeyDerivationParams {
    /// Reject parameters weaker than the minimum work factor
    pub fn validate(&self) -> Result<()> {
        if self.iterations < MIN_ITERATIONS {
            return Err(CryptoError::Derivation(format!(
                "iteration count {} is below the minimum of {}",
                self.iterations, MIN_ITERATIONS
            )));
        }
        Ok(())
    }
}

/// Generate a fresh random salt
pub fn generate_salt(backend: &dyn CryptoBackend) -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    backend.fill_random(&mut salt)?;
    Ok(salt)
}

/// Generate a fresh random AES-GCM nonce
pub fn generate_nonce(backend: &dyn CryptoBackend) -> Result<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    backend.fill_random(&mut nonce)?;
    Ok(nonce)
}

/// Generate a new random conversation secret (64 hex chars)
pub fn generate_shared_secret(backend: &dyn CryptoBackend) -> Result<SharedSecret> {
    let mut bytes = [0u8; 32];
    backend.fill_random(&mut bytes)?;
    let secret = SharedSecret::new(hex::encode(bytes));
    bytes.zeroize();
    Ok(secret)
}

/// Derive a 256-bit key from the conversation secret and a salt
///
/// # Arguments
/// * `backend` - Backend handle; derivation fails if it is unavailable
/// * `secret` - The shared conversation secret (must not be empty)
/// * `salt` - 16 bytes supplied by the caller
/// * `params` - Key derivation parameters
///
/// # Returns
/// A 32-byte key, identical for identical inputs
pub fn derive_key(
    backend: &dyn CryptoBackend,
    secret: &str,
    salt: &[u8; SALT_LEN],
    params: &KeyDerivationParams,
) -> Result<DerivedKey> {
    if !backend.is_available() {
        return Err(CryptoError::Derivation(format!(
            "backend '{}' is unavailable",
            backend.backend_name()
        )));
    }
    if secret.is_empty() {
        return Err(CryptoError::Derivation(
            "shared secret must not be empty".to_string(),
        ));
    }
    params.validate()?;

    let mut key_bytes = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, params.iterations, &mut key_bytes);

    let key = DerivedKey::new(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}
