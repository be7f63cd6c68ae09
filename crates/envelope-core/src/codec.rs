//! Envelope codec: plaintext + shared secret <-> envelope text
//!
//! Stateless between calls. Every encryption draws a fresh salt and nonce, so
//! each envelope gets its own derived key and nonce reuse cannot occur under
//! one key.

use std::sync::Arc;

use crate::config::CodecConfig;
use crate::crypto::{
    derive_key, generate_nonce, generate_salt, open, seal, CryptoBackend, KeyDerivationParams,
    OsBackend,
};
use crate::envelope::Envelope;
use crate::error::{CryptoError, Result};

/// Encrypts and decrypts chat envelopes
#[derive(Clone)]
pub struct EnvelopeCodec {
    backend: Arc<dyn CryptoBackend>,
    params: KeyDerivationParams,
    associated_data: Vec<u8>,
}

impl EnvelopeCodec {
    /// Create a codec over the given backend and configuration
    pub fn new(backend: Arc<dyn CryptoBackend>, config: &CodecConfig) -> Self {
        Self {
            backend,
            params: config.kdf_params(),
            associated_data: config.associated_data().to_vec(),
        }
    }

    /// Codec over the OS random source with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(OsBackend), &CodecConfig::default())
    }

    /// Get the backend handle
    pub fn backend(&self) -> &dyn CryptoBackend {
        self.backend.as_ref()
    }

    /// Seal plaintext into an envelope
    pub fn seal_envelope(&self, plaintext: &str, secret: &str) -> Result<Envelope> {
        let nonce = generate_nonce(self.backend())?;
        let salt = generate_salt(self.backend())?;
        let key = derive_key(self.backend(), secret, &salt, &self.params)?;

        let ciphertext = seal(&key, &nonce, plaintext.as_bytes(), &self.associated_data)?;

        Ok(Envelope {
            nonce,
            salt,
            ciphertext,
        })
    }

    /// Authenticate and open an envelope
    pub fn open_envelope(&self, envelope: &Envelope, secret: &str) -> Result<String> {
        let key = derive_key(self.backend(), secret, &envelope.salt, &self.params)?;
        let plaintext = open(
            &key,
            &envelope.nonce,
            &envelope.ciphertext,
            &self.associated_data,
        )?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::Encoding(e.utf8_error().to_string()))
    }

    /// Encrypt plaintext into envelope text
    pub fn encrypt(&self, plaintext: &str, secret: &str) -> Result<String> {
        Ok(self.seal_envelope(plaintext, secret)?.encode())
    }

    /// Decrypt envelope text back into plaintext
    pub fn decrypt(&self, envelope_text: &str, secret: &str) -> Result<String> {
        let envelope = Envelope::decode(envelope_text)?;
        self.open_envelope(&envelope, secret)
    }
}

impl std::fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("backend", &self.backend.backend_name())
            .field("params", &self.params)
            .field("associated_data_len", &self.associated_data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::testing::{FixedBackend, UnavailableBackend};
    use crate::crypto::{SALT_LEN, TAG_LEN};
    use crate::envelope::HEADER_LEN;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let codec = EnvelopeCodec::with_defaults();

        let envelope = codec.encrypt("hello", "pw123").unwrap();
        assert!(envelope.len() > 40);
        assert_eq!(codec.decrypt(&envelope, "pw123").unwrap(), "hello");
    }

    #[test]
    fn test_unicode_and_empty_plaintext() {
        let codec = EnvelopeCodec::with_defaults();

        for text in ["", "Merhaba dünya 🌍", "line one\nline two"] {
            let envelope = codec.encrypt(text, "pw").unwrap();
            assert_eq!(codec.decrypt(&envelope, "pw").unwrap(), text);
        }
    }

    #[test]
    fn test_envelope_layout() {
        let codec = EnvelopeCodec::with_defaults();
        let envelope = codec.seal_envelope("hello", "pw").unwrap();

        assert_eq!(envelope.ciphertext.len(), "hello".len() + TAG_LEN);
        assert_eq!(envelope.to_bytes().len(), HEADER_LEN + 5 + TAG_LEN);
    }

    #[test]
    fn test_wrong_secret_is_authentication_error() {
        let codec = EnvelopeCodec::with_defaults();
        let envelope = codec.encrypt("hello", "pw123").unwrap();

        assert!(matches!(
            codec.decrypt(&envelope, "wrongpw"),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_app_id_mismatch_is_authentication_error() {
        let config_a = CodecConfig {
            app_id: Some("app-a".to_string()),
            ..CodecConfig::default()
        };
        let codec_a = EnvelopeCodec::new(Arc::new(OsBackend), &config_a);
        let codec_plain = EnvelopeCodec::with_defaults();

        let envelope = codec_a.encrypt("hello", "pw").unwrap();
        assert_eq!(codec_a.decrypt(&envelope, "pw").unwrap(), "hello");
        assert!(matches!(
            codec_plain.decrypt(&envelope, "pw"),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        let codec = EnvelopeCodec::with_defaults();
        let salt = [5u8; SALT_LEN];
        let nonce = [6u8; 12];
        let key = derive_key(&OsBackend, "pw", &salt, &KeyDerivationParams::default()).unwrap();
        let ciphertext = seal(&key, &nonce, &[0xff, 0xfe, 0xfd], b"").unwrap();
        let text = Envelope {
            nonce,
            salt,
            ciphertext,
        }
        .encode();

        assert!(matches!(
            codec.decrypt(&text, "pw"),
            Err(CryptoError::Encoding(_))
        ));
    }

    #[test]
    fn test_unavailable_backend_fails_encrypt() {
        let codec = EnvelopeCodec::new(Arc::new(UnavailableBackend), &CodecConfig::default());

        assert!(matches!(
            codec.encrypt("hello", "pw"),
            Err(CryptoError::Derivation(_))
        ));
    }

    #[test]
    fn test_fixed_backend_still_roundtrips() {
        // Deterministic randomness must not break the format, only freshness
        let codec = EnvelopeCodec::new(Arc::new(FixedBackend(0x42)), &CodecConfig::default());

        let first = codec.encrypt("hello", "pw").unwrap();
        let second = codec.encrypt("hello", "pw").unwrap();
        assert_eq!(first, second);
        assert_eq!(codec.decrypt(&first, "pw").unwrap(), "hello");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", EnvelopeCodec::with_defaults());
        assert!(debug.contains("os-rng"));
    }
}
