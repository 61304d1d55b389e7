//! Rows stored by the server.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub login: String,
    pub password_hash: String,
    pub created_at: i64,
}

/// A sealed record as stored; the server never sees plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub id: Uuid,
    pub kind: String,
    pub data: Vec<u8>,
    pub nonce: Vec<u8>,
    pub version: i64,
}

pub(crate) fn parse_uuid(idx: usize, value: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
