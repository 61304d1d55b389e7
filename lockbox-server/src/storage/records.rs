//! Sealed record rows, scoped by owner, with version-checked writes.

use super::models::{parse_uuid, RecordRow};
use super::Storage;
use crate::error::ApiError;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: parse_uuid(0, row.get(0)?)?,
        kind: row.get(1)?,
        data: row.get(2)?,
        nonce: row.get(3)?,
        version: row.get(4)?,
    })
}

impl Storage {
    pub fn list_records(&self, user_id: Uuid) -> Result<Vec<RecordRow>, ApiError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, type, data, nonce, version FROM records WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([user_id.to_string()], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_record(&self, user_id: Uuid, id: Uuid) -> Result<Option<RecordRow>, ApiError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, type, data, nonce, version FROM records
                 WHERE user_id = ?1 AND id = ?2",
                params![user_id.to_string(), id.to_string()],
                record_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Store a record version.
    ///
    /// Version 1 is an upsert so a retried create succeeds. Any later
    /// version must be exactly one above the stored one; the check and the
    /// write run in one IMMEDIATE transaction so concurrent writers
    /// presenting the same version cannot both win. A later version for a
    /// record that no longer exists is a conflict too.
    pub fn save_record(&self, user_id: Uuid, record: &RecordRow) -> Result<(), ApiError> {
        if record.version < 1 {
            return Err(ApiError::BadRequest("version must be positive".to_string()));
        }

        let now = Utc::now().timestamp();
        let user_id = user_id.to_string();
        let id = record.id.to_string();
        let mut conn = self.conn()?;

        if record.version == 1 {
            conn.execute(
                "INSERT INTO records (id, user_id, type, data, nonce, version, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
                 ON CONFLICT (user_id, id) DO UPDATE SET
                    type = excluded.type,
                    data = excluded.data,
                    nonce = excluded.nonce,
                    version = 1,
                    updated_at = excluded.updated_at",
                params![id, user_id, record.kind, record.data, record.nonce, now],
            )?;
            return Ok(());
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<i64> = tx
            .query_row(
                "SELECT version FROM records WHERE user_id = ?1 AND id = ?2",
                params![user_id, id],
                |row| row.get(0),
            )
            .optional()?;

        let current = current.ok_or_else(|| {
            ApiError::Conflict(format!("record {} no longer exists", record.id))
        })?;
        if record.version - current != 1 {
            return Err(ApiError::Conflict(format!(
                "record {} is at version {}, got {}",
                record.id, current, record.version
            )));
        }

        tx.execute(
            "UPDATE records SET type = ?3, data = ?4, nonce = ?5, version = ?6, updated_at = ?7
             WHERE user_id = ?1 AND id = ?2",
            params![
                user_id,
                id,
                record.kind,
                record.data,
                record.nonce,
                record.version,
                now
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove a record. Deleting an absent record is not an error.
    pub fn delete_record(&self, user_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM records WHERE user_id = ?1 AND id = ?2",
            params![user_id.to_string(), id.to_string()],
        )?;
        Ok(())
    }
}
