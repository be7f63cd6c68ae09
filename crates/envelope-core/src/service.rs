//! Caller-facing crypto service
//!
//! Wraps the codec in timed, never-failing [`OperationResult`]s and owns the
//! send gate: outbound encryption only runs after a passing self-test, and an
//! inbound authentication failure closes the gate again until the next one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::codec::EnvelopeCodec;
use crate::config::CodecConfig;
use crate::crypto::{generate_shared_secret, CryptoBackend, OsBackend, SharedSecret};
use crate::error::{CryptoError, ErrorKind, Result};

/// Send gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceState {
    /// Self-test has not run yet
    Unverified,
    /// Self-test passed; sending enabled
    Ready,
    /// An inbound envelope failed authentication; sending paused
    SendBlocked,
    /// Self-test failed or the backend is unsupported
    Failed,
}

impl ServiceState {
    /// Why sending is disabled in this state, if it is
    pub fn send_block_reason(self) -> Option<&'static str> {
        match self {
            ServiceState::Ready => None,
            ServiceState::Unverified => Some("crypto self-test has not run"),
            ServiceState::SendBlocked => {
                Some("an inbound message failed verification - rerun the self-test")
            }
            ServiceState::Failed => Some("crypto self-test failed"),
        }
    }

    /// Whether the backend has been verified at least once and not failed since
    pub fn is_verified(self) -> bool {
        matches!(self, ServiceState::Ready | ServiceState::SendBlocked)
    }
}

/// Outcome of a single encrypt or decrypt call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    /// Envelope text (encrypt) or plaintext (decrypt); empty on failure
    pub data: String,
    pub elapsed_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl OperationResult {
    fn from_result(result: &Result<String>, elapsed: Duration) -> Self {
        let elapsed_time_ms = elapsed.as_secs_f64() * 1000.0;
        match result {
            Ok(data) => Self {
                success: true,
                data: data.clone(),
                elapsed_time_ms,
                error: None,
                error_detail: None,
            },
            Err(e) => Self {
                success: false,
                data: String::new(),
                elapsed_time_ms,
                error: Some(e.kind()),
                error_detail: Some(e.to_string()),
            },
        }
    }

    /// Whether the call failed tag verification
    pub fn is_authentication_failure(&self) -> bool {
        self.error == Some(ErrorKind::Authentication)
    }
}

/// Self-test diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfTestReport {
    pub passed: bool,
    pub backend: String,
    pub encrypt_ms: f64,
    pub decrypt_ms: f64,
    /// Length of the envelope text produced for the sample
    pub envelope_len: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl SelfTestReport {
    fn failed(backend: &str, err: &CryptoError) -> Self {
        Self {
            passed: false,
            backend: backend.to_string(),
            encrypt_ms: 0.0,
            decrypt_ms: 0.0,
            envelope_len: 0,
            error: Some(err.kind()),
            error_detail: Some(err.to_string()),
        }
    }
}

/// Compare a self-test round trip against its sample
fn check_round_trip(
    sample: &str,
    decrypted: Result<String>,
) -> (bool, Option<ErrorKind>, Option<String>) {
    let err = match decrypted {
        Ok(text) if text == sample => return (true, None, None),
        Ok(_) => CryptoError::SelfTestMismatch,
        Err(e) => e,
    };
    (false, Some(err.kind()), Some(err.to_string()))
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Envelope service with a self-test gated send path
pub struct CryptoService {
    codec: EnvelopeCodec,
    config: CodecConfig,
    state: Arc<RwLock<ServiceState>>,
}

impl CryptoService {
    /// Create a new service
    pub fn new(backend: Arc<dyn CryptoBackend>, config: CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            codec: EnvelopeCodec::new(backend, &config),
            config,
            state: Arc::new(RwLock::new(ServiceState::Unverified)),
        })
    }

    /// Service over the OS random source with default configuration
    pub fn with_defaults() -> Self {
        let config = CodecConfig::default();
        Self {
            codec: EnvelopeCodec::new(Arc::new(OsBackend), &config),
            config,
            state: Arc::new(RwLock::new(ServiceState::Unverified)),
        }
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Check whether the crypto backend is present
    pub fn is_supported(&self) -> bool {
        self.codec.backend().is_available()
    }

    /// Get the current gate state
    pub async fn state(&self) -> ServiceState {
        *self.state.read().await
    }

    /// Check if outbound encryption is currently allowed
    pub async fn can_send(&self) -> bool {
        self.state().await == ServiceState::Ready
    }

    /// Generate a new random conversation secret
    pub fn generate_shared_secret(&self) -> Result<SharedSecret> {
        generate_shared_secret(self.codec.backend())
    }

    async fn transition(&self, next: ServiceState) {
        let mut state = self.state.write().await;
        if *state != next {
            info!("Crypto service state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// Run a codec call on the blocking pool; derivation is CPU-bound
    async fn run_blocking<F>(&self, f: F) -> Result<String>
    where
        F: FnOnce(EnvelopeCodec) -> Result<String> + Send + 'static,
    {
        let codec = self.codec.clone();
        tokio::task::spawn_blocking(move || f(codec))
            .await
            .map_err(|e| CryptoError::Derivation(format!("crypto worker failed: {}", e)))?
    }

    async fn encrypt_ungated(&self, plaintext: &str, secret: &str) -> Result<String> {
        let plaintext = plaintext.to_string();
        let secret = SharedSecret::from(secret);
        self.run_blocking(move |codec| codec.encrypt(&plaintext, secret.expose()))
            .await
    }

    async fn decrypt_ungated(&self, envelope_text: &str, secret: &str) -> Result<String> {
        let envelope_text = envelope_text.to_string();
        let secret = SharedSecret::from(secret);
        self.run_blocking(move |codec| codec.decrypt(&envelope_text, secret.expose()))
            .await
    }

    /// Encrypt a message for sending, keeping the typed error
    ///
    /// Fails with `SendingDisabled` unless the self-test has passed and no
    /// inbound verification failure has been seen since.
    pub async fn try_encrypt(&self, plaintext: &str, secret: &str) -> Result<String> {
        match self.state().await.send_block_reason() {
            Some(reason) => Err(CryptoError::SendingDisabled(reason.to_string())),
            None => self.encrypt_ungated(plaintext, secret).await,
        }
    }

    /// Encrypt a message for sending
    pub async fn encrypt(&self, plaintext: &str, secret: &str) -> OperationResult {
        let start = Instant::now();
        let result = self.try_encrypt(plaintext, secret).await;

        let outcome = OperationResult::from_result(&result, start.elapsed());
        match &outcome.error {
            None => debug!("Encrypted message in {:.2}ms", outcome.elapsed_time_ms),
            Some(kind) => warn!(
                "Encryption failed after {:.2}ms: {}",
                outcome.elapsed_time_ms, kind
            ),
        }
        outcome
    }

    /// Decrypt a received envelope
    ///
    /// An envelope that fails verification, or is truncated or not an envelope
    /// at all, pauses sending until the self-test passes again.
    pub async fn decrypt(&self, envelope_text: &str, secret: &str) -> OperationResult {
        let start = Instant::now();

        let gated = self.config.gate_inbound_on_self_test && !self.state().await.is_verified();
        let result = if gated {
            Err(CryptoError::SelfTestRequired)
        } else {
            self.decrypt_ungated(envelope_text, secret).await
        };

        let outcome = OperationResult::from_result(&result, start.elapsed());
        match outcome.error {
            None => debug!("Decrypted message in {:.2}ms", outcome.elapsed_time_ms),
            Some(kind) if kind.is_security_relevant() => {
                warn!(
                    "Message could not be verified after {:.2}ms ({}); pausing outbound sending",
                    outcome.elapsed_time_ms, kind
                );
                let mut state = self.state.write().await;
                if *state == ServiceState::Ready {
                    *state = ServiceState::SendBlocked;
                }
            }
            Some(kind) => warn!(
                "Decryption failed after {:.2}ms: {}",
                outcome.elapsed_time_ms, kind
            ),
        }
        outcome
    }

    /// Round-trip `sample` and report timings; updates the gate state
    pub async fn run_diagnostics(&self, sample: &str, secret: &str) -> SelfTestReport {
        let backend = self.codec.backend().backend_name();

        let report = if !self.is_supported() {
            SelfTestReport::failed(
                backend,
                &CryptoError::Derivation(format!("backend '{}' is unavailable", backend)),
            )
        } else {
            self.round_trip(backend, sample, secret).await
        };

        if report.passed {
            info!(
                "Crypto self-test passed (encrypt {:.2}ms, decrypt {:.2}ms)",
                report.encrypt_ms, report.decrypt_ms
            );
            self.transition(ServiceState::Ready).await;
        } else {
            error!(
                "Crypto self-test failed: {}",
                report.error_detail.as_deref().unwrap_or("unknown error")
            );
            self.transition(ServiceState::Failed).await;
        }
        report
    }

    async fn round_trip(&self, backend: &str, sample: &str, secret: &str) -> SelfTestReport {
        let start = Instant::now();
        let envelope = match self.encrypt_ungated(sample, secret).await {
            Ok(envelope) => envelope,
            Err(e) => return SelfTestReport::failed(backend, &e),
        };
        let encrypt_ms = millis(start.elapsed());

        let start = Instant::now();
        let decrypted = self.decrypt_ungated(&envelope, secret).await;
        let decrypt_ms = millis(start.elapsed());

        let (passed, error, error_detail) = check_round_trip(sample, decrypted);

        SelfTestReport {
            passed,
            backend: backend.to_string(),
            encrypt_ms,
            decrypt_ms,
            envelope_len: envelope.len(),
            error,
            error_detail,
        }
    }

    /// Startup self-test: true when `sample` survives encrypt then decrypt
    pub async fn run_test(&self, sample: &str, secret: &str) -> bool {
        self.run_diagnostics(sample, secret).await.passed
    }

    /// Self-test with the configured sample
    pub async fn run_startup_test(&self, secret: &str) -> bool {
        let sample = self.config.self_test_sample.clone();
        self.run_test(&sample, secret).await
    }
}
