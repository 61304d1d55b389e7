//! Account rows.

use super::models::{parse_uuid, UserRow};
use super::Storage;
use crate::error::ApiError;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

impl Storage {
    pub fn login_exists(&self, login: &str) -> Result<bool, ApiError> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE login = ?1)",
            [login],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Insert a new account. A concurrent registration of the same login
    /// loses on the unique constraint and gets [`ApiError::LoginTaken`].
    pub fn create_user(&self, login: &str, password_hash: &str) -> Result<UserRow, ApiError> {
        let user = UserRow {
            id: Uuid::new_v4(),
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now().timestamp(),
        };

        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO users (id, login, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.id.to_string(), user.login, user.password_hash, user.created_at],
        );
        match inserted {
            Ok(_) => Ok(user),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(ApiError::LoginTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_user_by_login(&self, login: &str) -> Result<Option<UserRow>, ApiError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, login, password_hash, created_at FROM users WHERE login = ?1",
                [login],
                |row| {
                    Ok(UserRow {
                        id: parse_uuid(0, row.get(0)?)?,
                        login: row.get(1)?,
                        password_hash: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_find() {
        let storage = Storage::in_memory().unwrap();
        assert!(!storage.login_exists("alice").unwrap());

        let user = storage.create_user("alice", "$argon2id$hash").unwrap();
        assert!(storage.login_exists("alice").unwrap());

        let found = storage.find_user_by_login("alice").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password_hash, "$argon2id$hash");
        assert!(storage.find_user_by_login("bob").unwrap().is_none());
    }

    #[test]
    fn duplicate_login_is_taken() {
        let storage = Storage::in_memory().unwrap();
        storage.create_user("alice", "h1").unwrap();
        assert!(matches!(
            storage.create_user("alice", "h2"),
            Err(ApiError::LoginTaken)
        ));
    }
}
