//! Symmetric encryption for data at rest.
//!
//! - [`EncryptionService`]: AES-256-GCM encryption/decryption
//! - [`EncryptedData`]: Serializable encrypted data container
//! - Password-based key derivation using Argon2
//!
//! ## Usage
//!
//! ```rust
//! use tokenkeeper_common::crypto::encryption::EncryptionService;
//!
//! let service = EncryptionService::from_password_with_salt("correct horse battery", None)?;
//! let salt = service.password_salt().map(str::to_string);
//!
//! let sealed = service.encrypt_to_string(b"session")?;
//!
//! let reopened = EncryptionService::from_password_with_salt("correct horse battery", salt.as_deref())?;
//! assert_eq!(reopened.decrypt_from_string(&sealed)?, b"session");
//! # Ok::<(), tokenkeeper_common::error::CommonError>(())
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::SaltString;
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CommonError, CommonResult};

const ALGORITHM: &str = "AES-256-GCM";

/// Encrypted data container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub salt: Option<String>,
    pub algorithm: String,
}

/// AES-GCM encryption service with optional password-based key derivation.
///
/// The raw key is zeroed when the service is dropped.
pub struct EncryptionService {
    key: Zeroizing<Vec<u8>>,
    cipher: Aes256Gcm,
    password_salt: Option<String>,
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field("key", &"[REDACTED]")
            .field("key_len", &self.key.len())
            .field("password_salt", &self.password_salt.is_some())
            .finish()
    }
}

impl EncryptionService {
    /// Create a new encryption service from a raw 32-byte key.
    pub fn new(key: Vec<u8>) -> CommonResult<Self> {
        let key = Zeroizing::new(key);
        if key.len() != 32 {
            return Err(CommonError::internal("Encryption key must be exactly 32 bytes"));
        }

        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| {
            CommonError::internal(format!("Failed to create encryption cipher: {e}"))
        })?;

        Ok(Self { key, cipher, password_salt: None })
    }

    /// Derive an encryption key from a password and optional salt using Argon2.
    ///
    /// A fresh salt is generated when `salt` is `None`; read it back with
    /// [`Self::password_salt`] to derive the same key later.
    pub fn from_password_with_salt(password: &str, salt: Option<&str>) -> CommonResult<Self> {
        let salt = match salt {
            Some(existing) => SaltString::from_b64(existing)
                .map_err(|e| CommonError::internal(format!("Invalid password salt: {e}")))?,
            None => SaltString::generate(OsRng),
        };
        let argon2 = Argon2::default();

        let mut key = vec![0u8; 32];
        argon2
            .hash_password_into(password.as_bytes(), salt.as_str().as_bytes(), &mut key)
            .map_err(|e| CommonError::internal(format!("Key derivation failed: {e}")))?;

        let mut service = Self::new(key)?;
        service.password_salt = Some(salt.to_string());
        tracing::debug!(event = "crypto.key_derived", "derived session key from password");
        Ok(service)
    }

    /// Salt the key was derived with, if it came from a password.
    #[must_use]
    pub fn password_salt(&self) -> Option<&str> {
        self.password_salt.as_deref()
    }

    /// Encrypt bytes into an `EncryptedData` payload.
    pub fn encrypt(&self, data: &[u8]) -> CommonResult<EncryptedData> {
        let nonce_bytes = Self::generate_nonce();
        let ciphertext = self
            .cipher
            .encrypt(&Nonce::from(nonce_bytes), data)
            .map_err(|e| CommonError::internal(format!("Encryption failed: {e}")))?;

        Ok(EncryptedData {
            nonce: nonce_bytes.to_vec(),
            ciphertext,
            salt: self.password_salt.clone(),
            algorithm: ALGORITHM.to_string(),
        })
    }

    /// Decrypt an [`EncryptedData`] payload back into raw bytes.
    ///
    /// A wrong key surfaces as an internal error with context `decrypt`.
    pub fn decrypt(&self, encrypted: &EncryptedData) -> CommonResult<Vec<u8>> {
        if encrypted.algorithm != ALGORITHM {
            return Err(CommonError::internal(format!(
                "Unsupported algorithm: {}",
                encrypted.algorithm
            )));
        }

        let nonce_array: [u8; 12] = encrypted.nonce.as_slice().try_into().map_err(|_| {
            CommonError::internal("Nonce must be exactly 12 bytes for AES-256-GCM")
        })?;

        self.cipher
            .decrypt(&Nonce::from(nonce_array), encrypted.ciphertext.as_ref())
            .map_err(|e| CommonError::internal_with_context(e.to_string(), "decrypt"))
    }

    /// Encrypt bytes and encode the payload as a base64 string.
    pub fn encrypt_to_string(&self, data: &[u8]) -> CommonResult<String> {
        let encrypted = self.encrypt(data)?;
        let serialized = serde_json::to_vec(&encrypted)?;
        Ok(BASE64.encode(serialized))
    }

    /// Decode a base64 string and decrypt the contained payload.
    pub fn decrypt_from_string(&self, encrypted_str: &str) -> CommonResult<Vec<u8>> {
        let decoded = BASE64
            .decode(encrypted_str)
            .map_err(|e| CommonError::serialization_format("base64", e.to_string()))?;
        let encrypted: EncryptedData = serde_json::from_slice(&decoded)?;
        self.decrypt(&encrypted)
    }

    fn generate_nonce() -> [u8; 12] {
        let mut nonce = [0u8; 12];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}
