//! Key hierarchy.
//!
//! Password → Argon2id → User Key → seals records (synced)
//!                       User Key → HKDF-SHA256 → Store Key → seals local rows

use crate::crypto::{CryptoError, Result};
use hkdf::Hkdf;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

const STORE_KEY_INFO: &[u8] = b"lockbox/local-store/v1";

/// The per-user record key derived from the account password.
///
/// Records are sealed with this key before they leave the device. It is
/// re-derived at every login and never persisted.
#[derive(Clone, ZeroizeOnDrop)]
pub struct UserKey {
    key: [u8; 32],
}

impl UserKey {
    /// Create a user key from raw bytes
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Get a reference to the key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Derive the independent key for the local at-rest layer.
    pub fn store_key(&self) -> Result<StoreKey> {
        let hk = Hkdf::<Sha256>::new(None, &self.key);
        let mut okm = [0u8; 32];
        hk.expand(STORE_KEY_INFO, &mut okm)
            .map_err(|e| CryptoError::KdfFailed(format!("Store key expansion failed: {}", e)))?;
        let key = StoreKey::from_bytes(okm);
        okm.zeroize();
        Ok(key)
    }
}

impl fmt::Debug for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UserKey(<redacted>)")
    }
}

/// Key protecting rows of the local record store.
#[derive(Clone, ZeroizeOnDrop)]
pub struct StoreKey {
    key: [u8; 32],
}

impl StoreKey {
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoreKey(<redacted>)")
    }
}
