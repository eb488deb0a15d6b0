// Encryption module for state-serde
//
// This module provides password-based encryption of secret payloads.
// Codecs are selected by strategy and configured through `CodecConfig`.

use std::env;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::internal::error::{Error, Result};

pub mod aes_gcm;
pub mod chacha20_poly1305;
pub mod kdf;

/// Default PBKDF2-HMAC-SHA256 iteration count
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// Environment variable selecting the encryption strategy
pub const STRATEGY_ENV: &str = "STATE_SERDE_STRATEGY";

/// Environment variable overriding the PBKDF2 iteration count
pub const ITERATIONS_ENV: &str = "STATE_SERDE_PBKDF2_ITERATIONS";

/// Defines the encryption strategy to use.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionStrategy {
    /// No encryption, payloads are stored as-is
    NoEncryption,
    /// AES-256-GCM encryption
    #[default]
    AesGcm,
    /// ChaCha20-Poly1305 encryption
    #[serde(rename = "chacha20_poly1305")]
    ChaCha20Poly1305,
}

impl EncryptionStrategy {
    /// Parses a strategy name as used in configuration (`aes_gcm`, ...).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "no_encryption" | "none" => Ok(EncryptionStrategy::NoEncryption),
            "aes_gcm" => Ok(EncryptionStrategy::AesGcm),
            "chacha20_poly1305" => Ok(EncryptionStrategy::ChaCha20Poly1305),
            other => Err(Error::ConfigurationError(format!(
                "Unknown encryption strategy '{}'",
                other
            ))),
        }
    }
}

/// Configuration for secret codecs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub strategy: EncryptionStrategy,
    pub pbkdf2_iterations: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            strategy: EncryptionStrategy::default(),
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl CodecConfig {
    /// Builds a configuration from the defaults overridden by
    /// `STATE_SERDE_STRATEGY` and `STATE_SERDE_PBKDF2_ITERATIONS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(name) = env::var(STRATEGY_ENV) {
            config.strategy = EncryptionStrategy::from_name(&name)?;
        }
        if let Ok(iterations) = env::var(ITERATIONS_ENV) {
            config.pbkdf2_iterations = iterations.trim().parse().map_err(|_| {
                Error::ConfigurationError(format!(
                    "{} must be a positive integer, got '{}'",
                    ITERATIONS_ENV, iterations
                ))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON configuration document; missing fields take defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| Error::ConfigurationError(format!("Invalid codec config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pbkdf2_iterations == 0 {
            return Err(Error::ConfigurationError(
                "pbkdf2_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Password-based encryption of secret payloads.
///
/// Implementations must round-trip: decrypting the output of `encrypt` with the
/// same password yields the original plaintext. Encryption may be randomized.
#[async_trait]
pub trait SecretCodec: Debug + Send + Sync {
    /// Encrypts the given plaintext with a key derived from `password`.
    async fn encrypt(&self, plaintext: &str, password: &str) -> Result<String>;

    /// Decrypts a ciphertext produced by `encrypt` with the same password.
    async fn decrypt_with_key(&self, ciphertext: &str, password: &str) -> Result<String>;
}

/// Returns a SecretCodec implementation based on the given strategy.
pub fn get_codec(strategy: EncryptionStrategy) -> Arc<dyn SecretCodec> {
    get_codec_with_config(&CodecConfig {
        strategy,
        ..CodecConfig::default()
    })
}

/// Returns a SecretCodec implementation for the given configuration.
pub fn get_codec_with_config(config: &CodecConfig) -> Arc<dyn SecretCodec> {
    match config.strategy {
        EncryptionStrategy::NoEncryption => Arc::new(NoEncryptionCodec),
        EncryptionStrategy::AesGcm => {
            Arc::new(aes_gcm::AesGcmCodec::with_iterations(config.pbkdf2_iterations))
        }
        EncryptionStrategy::ChaCha20Poly1305 => Arc::new(
            chacha20_poly1305::ChaCha20Poly1305Codec::with_iterations(config.pbkdf2_iterations),
        ),
    }
}

/// A no-op codec that stores payloads as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncryptionCodec;

#[async_trait]
impl SecretCodec for NoEncryptionCodec {
    async fn encrypt(&self, plaintext: &str, _password: &str) -> Result<String> {
        Ok(plaintext.to_string())
    }

    async fn decrypt_with_key(&self, ciphertext: &str, _password: &str) -> Result<String> {
        Ok(ciphertext.to_string())
    }
}

/// Runs CPU-bound cipher work off the async worker threads.
///
/// Outside a tokio runtime there is no blocking pool, so the work runs inline
/// on the polling thread.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle
            .spawn_blocking(f)
            .await
            .map_err(|e| Error::EncryptionError(format!("Cipher task failed: {}", e)))?,
        Err(_) => {
            log::trace!("No tokio runtime, running cipher work inline");
            f()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_encryption() {
        let codec = NoEncryptionCodec;
        let encrypted = codec.encrypt("Test data", "pw").await.unwrap();
        assert_eq!(encrypted, "Test data");

        let decrypted = codec.decrypt_with_key(&encrypted, "pw").await.unwrap();
        assert_eq!(decrypted, "Test data");
    }

    #[tokio::test]
    async fn test_codecs_round_trip() {
        for strategy in [
            EncryptionStrategy::NoEncryption,
            EncryptionStrategy::AesGcm,
            EncryptionStrategy::ChaCha20Poly1305,
        ] {
            let codec = get_codec_with_config(&CodecConfig {
                strategy,
                pbkdf2_iterations: 1_000,
            });
            let data = "Test data for round trip";

            let encrypted = codec.encrypt(data, "pw").await.unwrap();
            if strategy != EncryptionStrategy::NoEncryption {
                assert_ne!(encrypted, data);
            }

            let decrypted = codec.decrypt_with_key(&encrypted, "pw").await.unwrap();
            assert_eq!(decrypted, data);
        }
    }

    #[test]
    fn test_codecs_without_tokio_runtime() {
        for strategy in [EncryptionStrategy::AesGcm, EncryptionStrategy::ChaCha20Poly1305] {
            let codec = get_codec_with_config(&CodecConfig {
                strategy,
                pbkdf2_iterations: 1_000,
            });
            let encrypted = futures::executor::block_on(codec.encrypt("Test data", "pw")).unwrap();
            let decrypted =
                futures::executor::block_on(codec.decrypt_with_key(&encrypted, "pw")).unwrap();
            assert_eq!(decrypted, "Test data");
        }
    }

    #[test]
    fn test_strategy_from_name() {
        assert_eq!(EncryptionStrategy::from_name("aes_gcm").unwrap(), EncryptionStrategy::AesGcm);
        assert_eq!(
            EncryptionStrategy::from_name(" ChaCha20_Poly1305 ").unwrap(),
            EncryptionStrategy::ChaCha20Poly1305
        );
        assert_eq!(EncryptionStrategy::from_name("none").unwrap(), EncryptionStrategy::NoEncryption);

        let err = EncryptionStrategy::from_name("rot13").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_config_from_json() {
        let config = CodecConfig::from_json_str(r#"{ "strategy": "chacha20_poly1305" }"#).unwrap();
        assert_eq!(config.strategy, EncryptionStrategy::ChaCha20Poly1305);
        assert_eq!(config.pbkdf2_iterations, DEFAULT_PBKDF2_ITERATIONS);

        let config = CodecConfig::from_json_str(r#"{ "pbkdf2_iterations": 5000 }"#).unwrap();
        assert_eq!(config.strategy, EncryptionStrategy::AesGcm);
        assert_eq!(config.pbkdf2_iterations, 5000);

        assert!(CodecConfig::from_json_str(r#"{ "pbkdf2_iterations": 0 }"#).is_err());
        assert!(CodecConfig::from_json_str(r#"{ "strategy": "rot13" }"#).is_err());
    }
}
