// Password-based sealing shared by the AEAD codecs
//
// Layout of a sealed payload before base64 encoding:
//   [salt: 16 bytes][nonce: NonceSize bytes][AEAD ciphertext + tag]
// The key is derived from the password and salt with PBKDF2-HMAC-SHA256.

use aes_gcm::aead::generic_array::typenum::Unsigned;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, Nonce, OsRng};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::Hmac;
use rand_core::RngCore;
use sha2::Sha256;

use crate::internal::error::{Error, Result};

/// The length of the derived key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// The length of the random salt prepended to every payload
pub const SALT_SIZE: usize = 16;

/// Derives a symmetric key from a password.
pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Result<[u8; KEY_SIZE]> {
    if iterations == 0 {
        return Err(Error::EncryptionError(
            "PBKDF2 iteration count must be positive".to_string(),
        ));
    }
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut key)
        .map_err(|e| Error::EncryptionError(format!("PBKDF2 failed: {:?}", e)))?;
    Ok(key)
}

/// Encrypts `plaintext` under a key derived from `password`, returning base64 text.
pub fn seal<C>(plaintext: &[u8], password: &str, iterations: u32) -> Result<String>
where
    C: Aead + AeadCore + KeyInit,
{
    let mut salt = [0u8; SALT_SIZE];
    rand_core::OsRng.fill_bytes(&mut salt);

    let key = derive_key(password, &salt, iterations)?;
    let cipher = C::new_from_slice(&key)
        .map_err(|e| Error::EncryptionError(format!("Invalid key length: {}", e)))?;

    let nonce = C::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::EncryptionError(format!("Encryption failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(SALT_SIZE + nonce.len() + ciphertext.len());
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(nonce.as_slice());
    sealed.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(sealed))
}

/// Reverses `seal`. Fails on malformed input or a wrong password.
pub fn open<C>(encoded: &str, password: &str, iterations: u32) -> Result<Vec<u8>>
where
    C: Aead + AeadCore + KeyInit,
{
    let data = BASE64
        .decode(encoded)
        .map_err(|e| Error::EncryptionError(format!("Ciphertext is not valid base64: {}", e)))?;

    let nonce_size = C::NonceSize::USIZE;
    if data.len() < SALT_SIZE + nonce_size {
        return Err(Error::EncryptionError(
            "Data too short to contain salt and nonce".to_string(),
        ));
    }

    let (salt, rest) = data.split_at(SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(nonce_size);

    let key = derive_key(password, salt, iterations)?;
    let cipher = C::new_from_slice(&key)
        .map_err(|e| Error::EncryptionError(format!("Invalid key length: {}", e)))?;

    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), ciphertext)
        .map_err(|e| Error::EncryptionError(format!("Decryption failed: {}", e)))
}
