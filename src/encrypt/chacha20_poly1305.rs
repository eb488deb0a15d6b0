// ChaCha20-Poly1305 secret codec for state-serde

use async_trait::async_trait;
use chacha20poly1305::ChaCha20Poly1305;

use super::{kdf, run_blocking, SecretCodec, DEFAULT_PBKDF2_ITERATIONS};
use crate::internal::error::{Error, Result};

/// ChaCha20-Poly1305 codec implementation
#[derive(Debug, Clone)]
pub struct ChaCha20Poly1305Codec {
    iterations: u32,
}

impl ChaCha20Poly1305Codec {
    pub fn new() -> Self {
        Self {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }

    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl Default for ChaCha20Poly1305Codec {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretCodec for ChaCha20Poly1305Codec {
    async fn encrypt(&self, plaintext: &str, password: &str) -> Result<String> {
        let iterations = self.iterations;
        let plaintext = plaintext.to_string();
        let password = password.to_string();
        run_blocking(move || {
            kdf::seal::<ChaCha20Poly1305>(plaintext.as_bytes(), &password, iterations)
        })
        .await
    }

    async fn decrypt_with_key(&self, ciphertext: &str, password: &str) -> Result<String> {
        let iterations = self.iterations;
        let ciphertext = ciphertext.to_string();
        let password = password.to_string();
        let plaintext = run_blocking(move || {
            kdf::open::<ChaCha20Poly1305>(&ciphertext, &password, iterations)
        })
        .await?;
        String::from_utf8(plaintext).map_err(|e| {
            Error::EncryptionError(format!(
                "ChaCha20-Poly1305 plaintext is not valid UTF-8: {}",
                e
            ))
        })
    }
}
