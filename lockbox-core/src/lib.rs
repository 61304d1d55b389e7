//! Lockbox Core Library
//!
//! Client side of the Lockbox secrets vault: per-record envelope encryption,
//! the encrypted local record store, the remote record gateway and the sync
//! engine that reconciles the two without ever auto-merging conflicting edits.

pub mod config;
pub mod crypto;
pub mod gateway;
pub mod record;
pub mod session;
pub mod store;
pub mod sync;
pub mod vault;

pub use config::ClientConfig;
pub use crypto::{
    decrypt_record, derive_user_key, encrypt_record, CryptoError, KdfParams, StoreKey, UserKey,
};
#[cfg(feature = "http")]
pub use gateway::http::HttpGateway;
pub use gateway::{PutOutcome, RecordGateway, RemoteRecord, ServerInfo};
pub use record::{Record, RecordData, RecordKind, RecordStatus};
pub use session::Session;
pub use store::{RecordStore, StoreError};
pub use sync::{
    ConflictResolver, Notice, Resolution, SchedulerOptions, SyncEngine, SyncHealth, SyncReport,
    SyncScheduler,
};
pub use vault::Vault;

use thiserror::Error;

/// Result type for Lockbox client operations
pub type Result<T> = std::result::Result<T, LockboxError>;

/// General error type for Lockbox client operations
#[derive(Error, Debug)]
pub enum LockboxError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Unauthorized: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Version conflict: {0}")]
    Conflict(String),

    #[error("Login is already taken")]
    LoginTaken,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Storage error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Failed to generate a unique record id after {0} attempts")]
    IdExhausted(usize),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse error classes used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    UnexpectedResponse,
    Network,
    Internal,
}

impl LockboxError {
    /// Classify this error.
    ///
    /// Ciphertext integrity failures, wherever they surface, count as
    /// authentication failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) | Self::LoginTaken => ErrorKind::Conflict,
            Self::UnexpectedResponse(_) => ErrorKind::UnexpectedResponse,
            Self::Network(_) => ErrorKind::Network,
            Self::Crypto(CryptoError::AuthenticationFailed) => ErrorKind::Authentication,
            Self::Store(StoreError::Crypto(CryptoError::AuthenticationFailed)) => {
                ErrorKind::Authentication
            }
            Self::Crypto(_) | Self::Store(_) | Self::IdExhausted(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error means the server could not be reached.
    pub fn is_network(&self) -> bool {
        self.kind() == ErrorKind::Network
    }
}
