//! Symmetric encryption for password config values.
//!
//! Password items are stored as `base64(encrypt(plaintext))`. The cipher key
//! is a single base64 string carrying 32 bytes of AES-256 key followed by a
//! 12 byte GCM nonce, the format installers already persist.
//!
//! The nonce is part of the key material and therefore fixed per key. That
//! is the established storage contract for these values; do not reuse this
//! cipher for anything else.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid cipher key: {0}")]
    InvalidKey(String),

    #[error("invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed: ciphertext is corrupt or was encrypted with another key")]
    Decrypt,

    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Opaque symmetric cipher used for password items.
pub trait Cipher: Send + Sync + std::fmt::Debug {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// AES-256-GCM with key and nonce taken from one key string.
#[derive(Clone)]
pub struct AesCipher {
    key: [u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
    aead: Aes256Gcm,
}

impl std::fmt::Debug for AesCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesCipher { .. }")
    }
}

impl AesCipher {
    fn from_parts(key: [u8; KEY_LEN], nonce: [u8; NONCE_LEN]) -> Result<Self, CryptoError> {
        let aead =
            Aes256Gcm::new_from_slice(&key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self {
            key,
            nonce,
            aead,
        })
    }

    /// Fresh random key material.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut rng = rand::rng();
        let mut key = [0u8; KEY_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut nonce);
        Self::from_parts(key, nonce)
    }

    /// Parse a key string produced by [`to_key_string`](Self::to_key_string).
    pub fn from_key_string(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        if bytes.len() != KEY_LEN + NONCE_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN + NONCE_LEN,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        key.copy_from_slice(&bytes[..KEY_LEN]);
        nonce.copy_from_slice(&bytes[KEY_LEN..]);
        Self::from_parts(key, nonce)
    }

    pub fn to_key_string(&self) -> String {
        let mut bytes = Vec::with_capacity(KEY_LEN + NONCE_LEN);
        bytes.extend_from_slice(&self.key);
        bytes.extend_from_slice(&self.nonce);
        STANDARD.encode(bytes)
    }
}

impl Cipher for AesCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.aead.encrypt(Nonce::from_slice(&self.nonce), plaintext).map_err(|_| CryptoError::Encrypt)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.aead
            .decrypt(Nonce::from_slice(&self.nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)
    }
}

/// Encrypt and base64 encode a password value.
pub fn encrypt_value(cipher: &dyn Cipher, plaintext: &str) -> Result<String, CryptoError> {
    Ok(STANDARD.encode(cipher.encrypt(plaintext.as_bytes())?))
}

/// Reverse of [`encrypt_value`].
pub fn decrypt_value(cipher: &dyn Cipher, stored: &str) -> Result<String, CryptoError> {
    let ciphertext = STANDARD.decode(stored.trim())?;
    Ok(String::from_utf8(cipher.decrypt(&ciphertext)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_roundtrip() {
        let cipher = AesCipher::generate().unwrap();
        let stored = encrypt_value(&cipher, "hunter2").unwrap();
        assert_ne!(stored, "hunter2");
        assert_eq!(decrypt_value(&cipher, &stored).unwrap(), "hunter2");
    }

    #[test]
    fn test_key_string_roundtrip() {
        let cipher = AesCipher::generate().unwrap();
        let restored = AesCipher::from_key_string(&cipher.to_key_string()).unwrap();
        let stored = encrypt_value(&cipher, "value").unwrap();
        assert_eq!(decrypt_value(&restored, &stored).unwrap(), "value");
        assert_eq!(restored.to_key_string(), cipher.to_key_string());
    }

    #[test]
    fn test_wrong_key_fails() {
        let a = AesCipher::generate().unwrap();
        let b = AesCipher::generate().unwrap();
        let stored = encrypt_value(&a, "value").unwrap();
        assert!(matches!(decrypt_value(&b, &stored), Err(CryptoError::Decrypt)));
        assert!(matches!(decrypt_value(&a, "not base64!"), Err(CryptoError::InvalidBase64(_))));
    }

    #[test]
    fn test_invalid_key_string() {
        assert!(matches!(
            AesCipher::from_key_string(&STANDARD.encode([0u8; 10])),
            Err(CryptoError::InvalidKey(_))
        ));
    }
}
