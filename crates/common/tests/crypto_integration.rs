//! Integration tests for crypto module
//!
//! Validates symmetric encryption across service instances and the
//! password-derived workflow the session store relies on.

#![cfg(feature = "runtime")]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokenkeeper_common::{EncryptedData, SymmetricEncryptionService};

/// End-to-end round-trip with one symmetric key across distinct service
/// instances.
#[test]
fn symmetric_encryption_round_trip_across_instances() {
    let key = vec![0x5a_u8; 32];
    let encryptor = SymmetricEncryptionService::new(key.clone()).expect("failed to init encryptor");
    let decryptor =
        SymmetricEncryptionService::new(key).expect("failed to init decryptor with same key");

    let plaintext = b"crypto integration payload";
    let encrypted = encryptor.encrypt(plaintext).expect("encrypt should succeed");

    assert_eq!(encrypted.algorithm, "AES-256-GCM");
    assert!(!encrypted.ciphertext.is_empty());

    let decrypted = decryptor.decrypt(&encrypted).expect("decrypt should succeed");
    assert_eq!(decrypted.as_slice(), plaintext);
}

/// Password-derived payloads embed the salt, and a second service derived from
/// the same password and salt opens them.
#[test]
fn password_derived_encryption_reopens_with_stored_salt() {
    let service =
        SymmetricEncryptionService::from_password_with_salt("correct horse battery staple", None)
            .expect("password-based service should initialize");

    let secret = b"persist-by-password";
    let encoded = service.encrypt_to_string(secret).expect("string encryption should succeed");
    let decoded = BASE64.decode(&encoded).expect("base64 decode should succeed");
    let payload: EncryptedData =
        serde_json::from_slice(&decoded).expect("serialized payload should deserialize");

    assert_eq!(payload.salt.as_deref(), service.password_salt());

    let reopened = SymmetricEncryptionService::from_password_with_salt(
        "correct horse battery staple",
        payload.salt.as_deref(),
    )
    .expect("same password and salt should derive the same key");
    let round_trip = reopened.decrypt_from_string(&encoded).expect("decrypt should succeed");
    assert_eq!(round_trip.as_slice(), secret);
}

/// Corrupted base64 input is reported, not panicked on.
#[test]
fn decrypt_from_string_rejects_garbage() {
    let service = SymmetricEncryptionService::new(vec![0x5a_u8; 32])
        .expect("service should initialize");
    assert!(service.decrypt_from_string("not base64 at all!").is_err());
}
