//! Cryptographic primitives for the Lockbox client.
//!
//! This module provides:
//! - Argon2id derivation of the per-user record key
//! - HKDF derivation of the independent at-rest store key
//! - AES-256-GCM sealing of individual records

pub mod cipher;
pub mod kdf;
pub mod keyring;

pub use cipher::{decrypt_record, encrypt_record, open, seal, NONCE_LEN, TAG_LEN};
pub use kdf::{derive_user_key, derive_user_key_with, KdfParams};
pub use keyring::{StoreKey, UserKey};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KdfFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed - data may have been tampered with")]
    AuthenticationFailed,
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
