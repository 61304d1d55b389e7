//! AES-256-GCM sealing for records and local store rows.
//!
//! Uses AES-256-GCM with:
//! - 256-bit key
//! - 96-bit (12 byte) nonce, fresh from the OS RNG for every sealing
//! - 128-bit authentication tag
//!
//! Two framings are used. Records carry their nonce in a separate field and
//! hold `ciphertext || tag` in the payload. Store rows are self-contained
//! `nonce || ciphertext || tag` blobs bound to their row id as AAD.

use crate::crypto::{CryptoError, Result, StoreKey, UserKey};
use crate::record::Record;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};

/// AES-GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Seal a record's plaintext payload with the user key.
///
/// Returns a copy of `record` whose payload is `ciphertext || tag` and whose
/// nonce is freshly generated. The input is not modified.
pub fn encrypt_record(record: &Record, key: &UserKey) -> Result<Record> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, record.payload.as_slice())
        .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

    let mut sealed = record.clone();
    sealed.payload = ciphertext;
    sealed.nonce = nonce.to_vec();
    Ok(sealed)
}

/// Open a sealed record with the user key.
///
/// Any failure (wrong key, modified payload or nonce, malformed nonce) is
/// reported as [`CryptoError::AuthenticationFailed`]; no unverified
/// plaintext is ever returned.
pub fn decrypt_record(record: &Record, key: &UserKey) -> Result<Record> {
    if record.nonce.len() != NONCE_LEN || record.payload.len() < TAG_LEN {
        return Err(CryptoError::AuthenticationFailed);
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(&record.nonce);

    let plaintext = cipher
        .decrypt(nonce, record.payload.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    let mut opened = record.clone();
    opened.payload = plaintext;
    Ok(opened)
}

/// Seal `plaintext` for the local store, bound to `aad`.
///
/// Returns `nonce(12) || ciphertext || tag(16)`.
pub fn seal(key: &StoreKey, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Open a blob produced by [`seal`].
pub fn open(key: &StoreKey, aad: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::AuthenticationFailed);
    }

    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed)
}
