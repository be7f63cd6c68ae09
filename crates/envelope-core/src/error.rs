//! Error types for envelope-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for envelope operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Envelope error types
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Envelope is not valid base64: {0}")]
    Decode(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Could not verify message: authentication tag mismatch")]
    Authentication,

    #[error("Decrypted payload is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("Message text must not be blank")]
    EmptyMessage,

    #[error("Self-test round trip returned different plaintext")]
    SelfTestMismatch,

    #[error("Sending is disabled: {0}")]
    SendingDisabled(String),

    #[error("Crypto self-test has not passed - run the self-test first")]
    SelfTestRequired,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CryptoError {
    /// Get the serializable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptoError::Derivation(_) => ErrorKind::Derivation,
            CryptoError::Encryption(_) => ErrorKind::Encryption,
            CryptoError::Decode(_) => ErrorKind::Decode,
            CryptoError::MalformedEnvelope(_) => ErrorKind::MalformedEnvelope,
            CryptoError::Authentication => ErrorKind::Authentication,
            CryptoError::Encoding(_) => ErrorKind::Encoding,
            CryptoError::EmptyMessage => ErrorKind::EmptyMessage,
            CryptoError::SelfTestMismatch => ErrorKind::SelfTestMismatch,
            CryptoError::SendingDisabled(_) => ErrorKind::SendingDisabled,
            CryptoError::SelfTestRequired => ErrorKind::SelfTestRequired,
            CryptoError::Transport(_) => ErrorKind::Transport,
            CryptoError::Config(_) | CryptoError::Io(_) | CryptoError::Serialization(_) => {
                ErrorKind::Config
            }
        }
    }
}

/// Error category reported to callers alongside an [`OperationResult`](crate::OperationResult)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Derivation,
    Encryption,
    Decode,
    MalformedEnvelope,
    /// Tag mismatch: wrong secret, tampering, or another conversation's envelope.
    /// Never retry with the same inputs.
    Authentication,
    Encoding,
    EmptyMessage,
    SelfTestMismatch,
    SendingDisabled,
    SelfTestRequired,
    Transport,
    Config,
}

impl ErrorKind {
    /// Whether this failure means an inbound envelope could not be trusted, as
    /// opposed to a local or configuration problem. These close the send gate.
    pub fn is_security_relevant(self) -> bool {
        matches!(
            self,
            ErrorKind::Authentication | ErrorKind::MalformedEnvelope | ErrorKind::Decode
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Derivation => "DerivationError",
            ErrorKind::Encryption => "EncryptionError",
            ErrorKind::Decode => "DecodeError",
            ErrorKind::MalformedEnvelope => "MalformedEnvelopeError",
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::Encoding => "EncodingError",
            ErrorKind::EmptyMessage => "EmptyMessage",
            ErrorKind::SelfTestMismatch => "SelfTestMismatch",
            ErrorKind::SendingDisabled => "SendingDisabled",
            ErrorKind::SelfTestRequired => "SelfTestRequired",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Config => "ConfigError",
        };
        f.write_str(name)
    }
}
