//! Codec configuration
//!
//! Stored as a plain JSON file. Nothing in here is secret: the shared secret
//! is always supplied per call.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::crypto::{KeyDerivationParams, DEFAULT_ITERATIONS};
use crate::error::{CryptoError, Result};

/// Sample used by the startup self-test when none is given
pub const DEFAULT_SELF_TEST_SAMPLE: &str = "Test Message";

/// Codec configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodecConfig {
    /// Config file version
    pub version: u32,
    /// PBKDF2 iterations; both ends must agree (default: 100,000)
    pub kdf_iterations: u32,
    /// Application identifier bound into every envelope as associated data.
    /// `None` keeps envelopes readable by any deployment sharing the secret.
    pub app_id: Option<String>,
    /// Plaintext round-tripped by the startup self-test
    pub self_test_sample: String,
    /// Refuse inbound decryption until the self-test has passed
    pub gate_inbound_on_self_test: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            version: 1,
            kdf_iterations: DEFAULT_ITERATIONS,
            app_id: None,
            self_test_sample: DEFAULT_SELF_TEST_SAMPLE.to_string(),
            gate_inbound_on_self_test: true,
        }
    }
}

impl CodecConfig {
    /// Key derivation parameters for this configuration
    pub fn kdf_params(&self) -> KeyDerivationParams {
        KeyDerivationParams {
            iterations: self.kdf_iterations,
        }
    }

    /// Associated data authenticated alongside every ciphertext
    pub fn associated_data(&self) -> &[u8] {
        self.app_id.as_deref().map(str::as_bytes).unwrap_or_default()
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        self.kdf_params()
            .validate()
            .map_err(|e| CryptoError::Config(e.to_string()))?;
        if self.self_test_sample.is_empty() {
            return Err(CryptoError::Config(
                "self-test sample must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the default config file location
    pub fn default_path() -> Result<PathBuf> {
        ProjectDirs::from("org", "chat-envelope", "chat-envelope")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .ok_or_else(|| CryptoError::Config("Could not determine config directory".to_string()))
    }

    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: CodecConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, path).await?;

        debug!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = CodecConfig::load(&temp_dir.path().join("config.json")).unwrap();

        assert_eq!(config, CodecConfig::default());
        assert_eq!(config.kdf_iterations, 100_000);
        assert!(config.gate_inbound_on_self_test);
        assert!(config.associated_data().is_empty());
    }

    #[tokio::test]
    async fn test_config_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let config = CodecConfig {
            kdf_iterations: 200_000,
            app_id: Some("chat-app-prod".to_string()),
            ..CodecConfig::default()
        };
        config.save(&path).await.unwrap();

        let loaded = CodecConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.associated_data(), b"chat-app-prod");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "appId": "staging" }"#).unwrap();

        let config = CodecConfig::load(&path).unwrap();
        assert_eq!(config.app_id.as_deref(), Some("staging"));
        assert_eq!(config.kdf_iterations, DEFAULT_ITERATIONS);
        assert_eq!(config.self_test_sample, DEFAULT_SELF_TEST_SAMPLE);
    }

    #[test]
    fn test_weak_iterations_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "kdfIterations": 1000 }"#).unwrap();

        let err = CodecConfig::load(&path).unwrap_err();
        assert!(matches!(err, CryptoError::Config(_)));
    }
}
