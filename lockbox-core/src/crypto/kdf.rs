//! Argon2id key derivation for the per-user record key.
//!
//! Uses Argon2id with parameters:
//! - Memory cost: 128 MiB (131,072 KiB)
//! - Time cost: 2 passes
//! - Parallelism: 4 lanes
//! - Output length: 32 bytes (256 bits)
//!
//! The salt is `login || user_id`, so the same password yields a different
//! key for every account. The key is re-derived at each login and never
//! persisted: losing the password loses the data.

use crate::crypto::{CryptoError, Result, UserKey};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Parameters for Argon2id key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (131,072 = 128 MiB)
    pub mem_cost: u32,

    /// Time cost (number of passes)
    pub time_cost: u32,

    /// Parallelism (number of lanes)
    pub parallelism: u32,

    /// Output length in bytes
    pub output_length: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost: 131_072, // 128 MiB
            time_cost: 2,
            parallelism: 4,
            output_length: 32,
        }
    }
}

impl KdfParams {
    /// Verify that parameters are not weaker than the defaults
    pub fn validate(&self) -> Result<()> {
        if self.mem_cost < 131_072 {
            return Err(CryptoError::KdfFailed(
                "Memory cost too low (minimum: 128 MiB)".to_string(),
            ));
        }
        if self.time_cost < 2 {
            return Err(CryptoError::KdfFailed(
                "Time cost too low (minimum: 2)".to_string(),
            ));
        }
        if self.parallelism < 1 {
            return Err(CryptoError::KdfFailed(
                "Parallelism too low (minimum: 1)".to_string(),
            ));
        }
        if self.output_length != 32 {
            return Err(CryptoError::KdfFailed(
                "Output length must be 32 bytes".to_string(),
            ));
        }
        Ok(())
    }
}

/// Derive the record key for an account with the default parameters.
///
/// Pure and deterministic: the same `(user_id, login, password)` always
/// yields the same key, and changing any one of them changes it.
pub fn derive_user_key(user_id: &str, login: &str, password: &[u8]) -> Result<UserKey> {
    derive_user_key_with(user_id, login, password, &KdfParams::default())
}

/// Derive the record key for an account with explicit parameters.
pub fn derive_user_key_with(
    user_id: &str,
    login: &str,
    password: &[u8],
    params: &KdfParams,
) -> Result<UserKey> {
    params.validate()?;

    let params_obj = Params::new(
        params.mem_cost,
        params.time_cost,
        params.parallelism,
        Some(params.output_length as usize),
    )
    .map_err(|e| CryptoError::KdfFailed(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params_obj);

    let mut salt = Vec::with_capacity(login.len() + user_id.len());
    salt.extend_from_slice(login.as_bytes());
    salt.extend_from_slice(user_id.as_bytes());

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password, &salt, &mut key)
        .map_err(|e| CryptoError::KdfFailed(format!("Hashing failed: {}", e)))?;

    let user_key = UserKey::from_bytes(key);
    key.zeroize();

    Ok(user_key)
}
