//! AES-256-GCM authenticated encryption
//!
//! - Nonce: 12 bytes (96 bits) - standard for GCM
//! - Auth tag: 16 bytes (128 bits), appended to the ciphertext by `seal`

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};

use super::DerivedKey;
use crate::error::{CryptoError, Result};

/// GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

fn cipher(key: &DerivedKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// Encrypt `plaintext`, returning ciphertext with the auth tag appended
pub fn seal(
    key: &DerivedKey,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    cipher(key)
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

/// Verify the tag and decrypt; no plaintext is released on mismatch
pub fn open(
    key: &DerivedKey,
    nonce: &[u8; NONCE_LEN],
    ciphertext_with_tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    if ciphertext_with_tag.len() < TAG_LEN {
        return Err(CryptoError::MalformedEnvelope(format!(
            "ciphertext shorter than the {}-byte tag",
            TAG_LEN
        )));
    }

    cipher(key)
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext_with_tag,
                aad,
            },
        )
        .map_err(|_| CryptoError::Authentication)
}
