//! # envelope-core
//!
//! Authenticated message envelopes for chat conversations sharing one secret:
//! - PBKDF2-HMAC-SHA256 key derivation from the conversation secret
//! - AES-256-GCM sealing into a base64 `nonce ‖ salt ‖ ciphertext+tag` envelope
//! - A self-tested service that gates outbound (and optionally inbound) traffic
//! - A transport seam for publishing and reading envelopes verbatim

pub mod codec;
pub mod config;
pub mod conversation;
pub mod crypto;
pub mod envelope;
pub mod error;
mod service;

pub use codec::EnvelopeCodec;
pub use config::CodecConfig;
pub use conversation::{
    ChatMessage, Conversation, DisplayMessage, InMemoryTransport, MessageStatus, MessageTransport,
};
pub use crypto::{
    derive_key, generate_shared_secret, CryptoBackend, DerivedKey, KeyDerivationParams, OsBackend,
    SharedSecret,
};
pub use envelope::Envelope;
pub use error::{CryptoError, ErrorKind, Result};
pub use service::{CryptoService, OperationResult, SelfTestReport, ServiceState};
