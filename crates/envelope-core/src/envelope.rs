//! Envelope wire format
//!
//! Format: base64 (standard alphabet, padded) of
//! `{nonce: 12 bytes}{salt: 16 bytes}{ciphertext + tag: variable}`
//!
//! The transport stores the text verbatim; everything needed to decrypt except
//! the shared secret travels inside it.

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::crypto::{NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::error::{CryptoError, Result};

/// Length of the fixed `nonce ‖ salt` header
pub const HEADER_LEN: usize = NONCE_LEN + SALT_LEN;

/// Smallest decoded envelope that can carry a tag
pub const MIN_ENVELOPE_LEN: usize = HEADER_LEN + TAG_LEN;

/// Decoded envelope fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// AES-GCM nonce (12 bytes)
    pub nonce: [u8; NONCE_LEN],
    /// Key derivation salt (16 bytes)
    pub salt: [u8; SALT_LEN],
    /// Ciphertext with the 16-byte auth tag appended
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Concatenate `nonce ‖ salt ‖ ciphertext`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Split raw bytes into fields
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CryptoError::MalformedEnvelope(format!(
                "expected at least {} header bytes, got {}",
                HEADER_LEN,
                bytes.len()
            )));
        }
        if bytes.len() < MIN_ENVELOPE_LEN {
            return Err(CryptoError::MalformedEnvelope(format!(
                "expected at least {} bytes including the auth tag, got {}",
                MIN_ENVELOPE_LEN,
                bytes.len()
            )));
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[NONCE_LEN..HEADER_LEN]);

        Ok(Self {
            nonce,
            salt,
            ciphertext: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Encode as envelope text
    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Parse envelope text; surrounding whitespace is ignored
    pub fn decode(text: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::Decode(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Envelope {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            nonce: [1u8; NONCE_LEN],
            salt: [2u8; SALT_LEN],
            ciphertext: vec![3u8; TAG_LEN + 5],
        }
    }

    #[test]
    fn test_field_layout() {
        let bytes = sample().to_bytes();

        assert_eq!(bytes.len(), HEADER_LEN + TAG_LEN + 5);
        assert!(bytes[..12].iter().all(|b| *b == 1));
        assert!(bytes[12..28].iter().all(|b| *b == 2));
        assert!(bytes[28..].iter().all(|b| *b == 3));
    }

    #[test]
    fn test_text_parse() {
        let text = sample().to_string();
        let parsed: Envelope = text.parse().unwrap();
        assert_eq!(parsed, sample());

        let padded = format!("  {}\n", text);
        assert_eq!(Envelope::decode(&padded).unwrap(), sample());
    }

    #[test]
    fn test_invalid_base64_is_decode_error() {
        assert!(matches!(
            Envelope::decode("not base64!!"),
            Err(CryptoError::Decode(_))
        ));
    }

    #[test]
    fn test_short_payloads_are_malformed() {
        let short = STANDARD.encode([0u8; 27]);
        assert!(matches!(
            Envelope::decode(&short),
            Err(CryptoError::MalformedEnvelope(_))
        ));

        let header_only = STANDARD.encode([0u8; HEADER_LEN + 4]);
        assert!(matches!(
            Envelope::decode(&header_only),
            Err(CryptoError::MalformedEnvelope(_))
        ));

        assert!(matches!(
            Envelope::decode(""),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }
}
