//! Backend handle for randomness and availability checks
//!
//! Every derivation and codec call receives the backend explicitly, so tests
//! can swap in doubles and nothing depends on process-wide state.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, Result};

/// Source of secure randomness used by the codec
pub trait CryptoBackend: Send + Sync {
    /// Fill `dest` with cryptographically secure random bytes
    fn fill_random(&self, dest: &mut [u8]) -> Result<()>;

    /// Check whether the backend can currently serve requests
    fn is_available(&self) -> bool;

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}

/// Operating system CSPRNG backend
#[derive(Debug, Clone, Copy, Default)]
pub struct OsBackend;

impl CryptoBackend for OsBackend {
    fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(dest).map_err(|e| {
            CryptoError::Derivation(format!("secure random source unavailable: {}", e))
        })
    }

    fn is_available(&self) -> bool {
        let mut byte = [0u8; 1];
        OsRng.try_fill_bytes(&mut byte).is_ok()
    }

    fn backend_name(&self) -> &'static str {
        "os-rng"
    }
}
