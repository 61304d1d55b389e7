//! Remote record gateway: the client's view of the record service.

#[cfg(feature = "http")]
pub mod http;

use crate::record::{base64_bytes, Record, RecordKind, RecordStatus};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sealed record as the server stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// `ciphertext || tag`
    #[serde(rename = "data", with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    pub version: u64,
}

impl RemoteRecord {
    /// Wire form of an already sealed record. Local status is dropped.
    pub fn from_sealed(record: &Record) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            ciphertext: record.payload.clone(),
            nonce: record.nonce.clone(),
            version: record.version,
        }
    }

    /// Sealed local form of this record with the given status.
    pub fn into_sealed(self, status: RecordStatus) -> Record {
        Record {
            id: self.id,
            kind: self.kind,
            payload: self.ciphertext,
            nonce: self.nonce,
            version: self.version,
            status,
        }
    }
}

/// Result of a versioned write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Accepted,
    /// The server holds a version the write did not follow from.
    Conflict,
}

/// Build information reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub build_version: Option<String>,
    pub build_date: Option<String>,
}

/// Access to the remote record service.
///
/// Every record call is scoped to the account of the current session.
#[async_trait]
pub trait RecordGateway: Send + Sync {
    async fn list_records(&self) -> Result<Vec<RemoteRecord>>;

    /// Fails with `NotFound` when the id is unknown to the server.
    async fn get_record(&self, id: Uuid) -> Result<RemoteRecord>;

    async fn put_record(&self, record: &RemoteRecord) -> Result<PutOutcome>;

    /// Deleting an unknown id succeeds.
    async fn delete_record(&self, id: Uuid) -> Result<()>;

    /// Create an account and return its bearer token.
    async fn register(&self, login: &str, password: &str) -> Result<String>;

    /// Authenticate and return a bearer token.
    async fn login(&self, login: &str, password: &str) -> Result<String>;

    async fn server_info(&self) -> Result<ServerInfo>;
}
