// AES-GCM secret codec for state-serde
//
// This module provides password-based AES-256-GCM encryption of secret payloads.

use aes_gcm::Aes256Gcm;
use async_trait::async_trait;

use super::{kdf, run_blocking, SecretCodec, DEFAULT_PBKDF2_ITERATIONS};
use crate::internal::error::{Error, Result};

/// AES-GCM codec implementation
#[derive(Debug, Clone)]
pub struct AesGcmCodec {
    iterations: u32,
}

impl AesGcmCodec {
    /// Creates a new AesGcmCodec with the default PBKDF2 iteration count.
    pub fn new() -> Self {
        Self {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }

    /// Creates a new AesGcmCodec with a custom PBKDF2 iteration count.
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl Default for AesGcmCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretCodec for AesGcmCodec {
    async fn encrypt(&self, plaintext: &str, password: &str) -> Result<String> {
        let iterations = self.iterations;
        let plaintext = plaintext.to_string();
        let password = password.to_string();
        run_blocking(move || kdf::seal::<Aes256Gcm>(plaintext.as_bytes(), &password, iterations))
            .await
    }

    async fn decrypt_with_key(&self, ciphertext: &str, password: &str) -> Result<String> {
        let iterations = self.iterations;
        let ciphertext = ciphertext.to_string();
        let password = password.to_string();
        let plaintext =
            run_blocking(move || kdf::open::<Aes256Gcm>(&ciphertext, &password, iterations)).await?;
        String::from_utf8(plaintext).map_err(|e| {
            Error::EncryptionError(format!("AES-GCM plaintext is not valid UTF-8: {}", e))
        })
    }
}
