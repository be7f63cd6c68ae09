//! Conversation over an opaque message transport
//!
//! The transport stores envelope text verbatim next to sender metadata; only
//! the two ends holding the shared secret can read it.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::crypto::SharedSecret;
use crate::error::{CryptoError, ErrorKind, Result};
use crate::service::CryptoService;

/// Message document as stored by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: String,
    /// Envelope text when `is_encrypted`, raw text otherwise
    pub content: String,
    pub is_encrypted: bool,
    /// Time the sender spent encrypting, shown next to the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_time_ms: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// New encrypted message carrying `envelope`
    pub fn encrypted(sender_id: &str, envelope: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: sender_id.to_string(),
            content: envelope,
            is_encrypted: true,
            encryption_time_ms: None,
            created_at: Utc::now(),
        }
    }

    /// Record how long encryption took
    pub fn with_encryption_time(mut self, elapsed_ms: f64) -> Self {
        self.encryption_time_ms = Some(elapsed_ms);
        self
    }
}

/// Storage for message documents
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Store a message
    async fn publish(&self, message: ChatMessage) -> Result<()>;

    /// Retrieve every message, oldest first
    async fn fetch_all(&self) -> Result<Vec<ChatMessage>>;

    /// Get a human-readable name for this transport
    fn transport_name(&self) -> &'static str;
}

/// Process-local transport
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransport {
    messages: Arc<RwLock<Vec<ChatMessage>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn publish(&self, message: ChatMessage) -> Result<()> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<ChatMessage>> {
        let mut messages = self.messages.read().await.clone();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    fn transport_name(&self) -> &'static str {
        "in-memory"
    }
}

/// How a message should be shown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum MessageStatus {
    /// Decryption has not finished yet
    Pending,
    Decrypted {
        text: String,
        #[serde(rename = "elapsedMs")]
        elapsed_ms: f64,
    },
    /// Could not verify or decrypt; never shown as message text
    Unverified { error: ErrorKind, detail: String },
    /// Stored without encryption
    Plaintext { text: String },
}

/// A message paired with its display status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    pub message: ChatMessage,
    pub status: MessageStatus,
}

impl DisplayMessage {
    /// Display entry before decryption has run: encrypted messages are
    /// `Pending`, plaintext ones are shown as-is
    pub fn pending(message: ChatMessage) -> Self {
        let status = if message.is_encrypted {
            MessageStatus::Pending
        } else {
            MessageStatus::Plaintext {
                text: message.content.clone(),
            }
        };
        Self { message, status }
    }
}

/// One conversation: a shared secret, a transport, and the local sender
pub struct Conversation<T: MessageTransport> {
    service: Arc<CryptoService>,
    transport: T,
    secret: SharedSecret,
    sender_id: String,
}

impl<T: MessageTransport> Conversation<T> {
    pub fn new(
        service: Arc<CryptoService>,
        transport: T,
        secret: SharedSecret,
        sender_id: impl Into<String>,
    ) -> Self {
        Self {
            service,
            transport,
            secret,
            sender_id: sender_id.into(),
        }
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encrypt and publish a message
    pub async fn send(&self, text: &str) -> Result<ChatMessage> {
        if text.trim().is_empty() {
            return Err(CryptoError::EmptyMessage);
        }

        let start = Instant::now();
        let envelope = self.service.try_encrypt(text, self.secret.expose()).await?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let message =
            ChatMessage::encrypted(&self.sender_id, envelope).with_encryption_time(elapsed_ms);
        self.transport.publish(message.clone()).await?;

        debug!(
            "Published message {} via {} ({:.2}ms to encrypt)",
            message.id,
            self.transport.transport_name(),
            elapsed_ms
        );
        Ok(message)
    }

    async fn resolve(&self, message: ChatMessage) -> DisplayMessage {
        if !message.is_encrypted {
            return DisplayMessage::pending(message);
        }

        let result = self
            .service
            .decrypt(&message.content, self.secret.expose())
            .await;

        let status = if result.success {
            MessageStatus::Decrypted {
                text: result.data,
                elapsed_ms: result.elapsed_time_ms,
            }
        } else {
            MessageStatus::Unverified {
                error: result.error.unwrap_or(ErrorKind::Authentication),
                detail: result.error_detail.unwrap_or_default(),
            }
        };

        DisplayMessage { message, status }
    }

    /// Fetch every message without decrypting, for the first render
    pub async fn snapshot(&self) -> Result<Vec<DisplayMessage>> {
        let messages = self.transport.fetch_all().await?;
        Ok(messages.into_iter().map(DisplayMessage::pending).collect())
    }

    /// Fetch every message and decrypt them concurrently
    pub async fn refresh(&self) -> Result<Vec<DisplayMessage>> {
        let messages = self.transport.fetch_all().await?;
        let count = messages.len();

        let resolved = join_all(messages.into_iter().map(|m| self.resolve(m))).await;

        debug!("Resolved {} messages", count);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EnvelopeCodec;

    async fn ready_service() -> Arc<CryptoService> {
        let service = CryptoService::with_defaults();
        assert!(service.run_test("Test Message", "conv-secret").await);
        Arc::new(service)
    }

    #[tokio::test]
    async fn test_send_and_refresh() {
        let service = ready_service().await;
        let transport = InMemoryTransport::new();
        let alice = Conversation::new(
            service.clone(),
            transport.clone(),
            "conv-secret".into(),
            "alice",
        );
        let bob = Conversation::new(service, transport.clone(), "conv-secret".into(), "bob");

        let sent = alice.send("merhaba").await.unwrap();
        assert!(sent.is_encrypted);
        assert!(sent.encryption_time_ms.unwrap() > 0.0);
        assert_ne!(sent.content, "merhaba");

        let view = bob.refresh().await.unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].message.sender_id, "alice");
        match &view[0].status {
            MessageStatus::Decrypted { text, .. } => assert_eq!(text, "merhaba"),
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_foreign_envelope_is_unverified() {
        let service = ready_service().await;
        let transport = InMemoryTransport::new();
        let other = EnvelopeCodec::with_defaults()
            .encrypt("from another room", "other-secret")
            .unwrap();
        transport
            .publish(ChatMessage::encrypted("mallory", other))
            .await
            .unwrap();

        let conv = Conversation::new(service.clone(), transport, "conv-secret".into(), "bob");
        let view = conv.refresh().await.unwrap();

        assert!(matches!(
            view[0].status,
            MessageStatus::Unverified {
                error: ErrorKind::Authentication,
                ..
            }
        ));
        // Sending pauses until the self-test passes again
        assert!(matches!(
            conv.send("hi").await,
            Err(CryptoError::SendingDisabled(_))
        ));
    }

    #[tokio::test]
    async fn test_plaintext_messages_pass_through() {
        let service = ready_service().await;
        let transport = InMemoryTransport::new();
        let mut message = ChatMessage::encrypted("system", "welcome".to_string());
        message.is_encrypted = false;
        transport.publish(message).await.unwrap();

        let conv = Conversation::new(service, transport, "conv-secret".into(), "bob");
        let view = conv.refresh().await.unwrap();
        assert_eq!(
            view[0].status,
            MessageStatus::Plaintext {
                text: "welcome".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let service = ready_service().await;
        let conv = Conversation::new(service, InMemoryTransport::new(), "conv-secret".into(), "a");

        let err = conv.send("   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyMessage);
        assert!(conv.transport().fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_secret_reports_derivation_error() {
        let service = ready_service().await;
        let conv = Conversation::new(service.clone(), InMemoryTransport::new(), "".into(), "a");

        let err = conv.send("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Derivation);
        assert!(conv.transport().fetch_all().await.unwrap().is_empty());
        // A local secret problem is not an inbound forgery; sending stays open
        assert!(service.can_send().await);
    }

    #[tokio::test]
    async fn test_snapshot_then_refresh() {
        let service = ready_service().await;
        let transport = InMemoryTransport::new();
        let conv = Conversation::new(service, transport.clone(), "conv-secret".into(), "a");
        conv.send("first").await.unwrap();
        let mut notice = ChatMessage::encrypted("system", "joined".to_string());
        notice.is_encrypted = false;
        transport.publish(notice).await.unwrap();

        let first = conv.snapshot().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].status, MessageStatus::Pending);
        assert_eq!(
            first[1].status,
            MessageStatus::Plaintext {
                text: "joined".to_string()
            }
        );

        let resolved = conv.refresh().await.unwrap();
        assert!(matches!(
            resolved[0].status,
            MessageStatus::Decrypted { ref text, .. } if text == "first"
        ));
    }

    #[tokio::test]
    async fn test_send_before_self_test_fails() {
        let service = Arc::new(CryptoService::with_defaults());
        let conv = Conversation::new(service, InMemoryTransport::new(), "conv-secret".into(), "a");

        assert!(matches!(
            conv.send("hello").await,
            Err(CryptoError::SendingDisabled(_))
        ));
    }

    #[test]
    fn test_status_json_shape() {
        let status = MessageStatus::Unverified {
            error: ErrorKind::Authentication,
            detail: "tag mismatch".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "unverified");
        assert_eq!(json["error"], "authentication");

        let pending = DisplayMessage::pending(ChatMessage::encrypted("a", "x".to_string()));
        assert_eq!(pending.status, MessageStatus::Pending);
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["status"]["status"], "pending");
        assert!(json["message"].get("encryptionTimeMs").is_none());
    }
}
