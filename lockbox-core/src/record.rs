//! Record model: the unit of storage and sync.

use crate::{LockboxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Kind of secret a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Credentials,
    Text,
    Binary,
    Card,
}

impl RecordKind {
    /// Convert the kind to its wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credentials => "credentials",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Card => "card",
        }
    }

    /// Parse a kind from its wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credentials" => Some(Self::Credentials),
            "text" => Some(Self::Text),
            "binary" => Some(Self::Binary),
            "card" => Some(Self::Card),
            _ => None,
        }
    }
}

/// Local sync state of a record. Never sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Written locally, not yet acknowledged by the server.
    Pending,
    Synced,
    /// Local and remote edits diverged; needs an explicit resolution.
    Conflict,
    /// Tombstone awaiting remote deletion.
    Deleted,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Conflict => "conflict",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "synced" => Some(Self::Synced),
            "conflict" => Some(Self::Conflict),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// A stored secret.
///
/// `payload` holds the JSON-encoded [`RecordData`] while the record is in
/// plaintext form, and `ciphertext || tag` once it has been sealed with
/// [`crate::crypto::encrypt_record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub kind: RecordKind,
    pub payload: Vec<u8>,
    /// AES-GCM nonce of the last sealing; empty for a never-sealed record.
    pub nonce: Vec<u8>,
    /// Version of the last write. 0 until the first save.
    pub version: u64,
    pub status: RecordStatus,
}

impl Record {
    /// Build a new, unsaved plaintext record.
    pub fn new(id: Uuid, data: &RecordData) -> Result<Self> {
        Ok(Self {
            id,
            kind: data.kind(),
            payload: data.to_payload()?,
            nonce: Vec::new(),
            version: 0,
            status: RecordStatus::Pending,
        })
    }

    /// Decode the plaintext payload.
    pub fn data(&self) -> Result<RecordData> {
        let data = RecordData::from_payload(&self.payload)?;
        if data.kind() != self.kind {
            return Err(LockboxError::Validation(format!(
                "record {} is {} but payload holds {}",
                self.id,
                self.kind.as_str(),
                data.kind().as_str()
            )));
        }
        Ok(data)
    }

    /// Replace the plaintext payload (and kind) with `data`.
    pub fn set_data(&mut self, data: &RecordData) -> Result<()> {
        self.payload = data.to_payload()?;
        self.kind = data.kind();
        Ok(())
    }

    /// Whether the server has accepted this record's version.
    pub(crate) fn version_observed(&self) -> bool {
        self.version == 0 || self.status == RecordStatus::Synced
    }
}

/// Free-form labels attached to every secret.
pub type Metadata = BTreeMap<String, String>;

/// Typed plaintext content of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordData {
    Credentials {
        resource: String,
        login: String,
        password: String,
        #[serde(default)]
        metadata: Metadata,
    },
    Text {
        text: String,
        #[serde(default)]
        metadata: Metadata,
    },
    Binary {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        #[serde(default)]
        metadata: Metadata,
    },
    Card {
        number: String,
        expiry: String,
        cvv: String,
        holder: String,
        #[serde(default)]
        metadata: Metadata,
    },
}

impl RecordData {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Credentials { .. } => RecordKind::Credentials,
            Self::Text { .. } => RecordKind::Text,
            Self::Binary { .. } => RecordKind::Binary,
            Self::Card { .. } => RecordKind::Card,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Credentials { metadata, .. }
            | Self::Text { metadata, .. }
            | Self::Binary { metadata, .. }
            | Self::Card { metadata, .. } => metadata,
        }
    }

    fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| LockboxError::Validation(format!("Failed to encode record: {}", e)))
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| LockboxError::Validation(format!("Failed to decode record: {}", e)))
    }
}

/// Base64 serialization for `Vec<u8>` in JSON bodies.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
