//! Account and record operations behind the HTTP handlers.

use crate::auth::TokenService;
use crate::error::ApiError;
use crate::password::{hash_password, verify_password};
use crate::storage::models::RecordRow;
use crate::storage::Storage;
use chrono::NaiveDate;
use uuid::Uuid;

/// Build metadata reported by `/version`.
#[derive(Debug, Clone, Default)]
pub struct BuildInfo {
    pub version: Option<String>,
    pub date: Option<NaiveDate>,
}

impl BuildInfo {
    /// This crate's version and an optional build date.
    pub fn current(date: Option<NaiveDate>) -> Self {
        Self {
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            date,
        }
    }
}

/// Shared state of the server: storage, token issuer and build info.
#[derive(Clone)]
pub struct RecordService {
    storage: Storage,
    tokens: TokenService,
    build: BuildInfo,
}

impl RecordService {
    pub fn new(storage: Storage, tokens: TokenService, build: BuildInfo) -> Self {
        Self {
            storage,
            tokens,
            build,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn build_info(&self) -> &BuildInfo {
        &self.build
    }

    /// Create an account and return a token for it.
    pub async fn register(&self, login: &str, password: &str) -> Result<String, ApiError> {
        validate_credentials(login, password)?;
        if self.storage.login_exists(login)? {
            return Err(ApiError::LoginTaken);
        }

        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))??;

        let user = self.storage.create_user(login, &hash)?;
        tracing::info!(user_id = %user.id, "account registered");
        self.tokens.issue(user.id)
    }

    /// Check credentials and return a fresh token.
    pub async fn login(&self, login: &str, password: &str) -> Result<String, ApiError> {
        validate_credentials(login, password)?;
        let user = self
            .storage
            .find_user_by_login(login)?
            .ok_or_else(|| ApiError::Unauthorized("Invalid login or password".to_string()))?;

        let password = password.to_string();
        let stored = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))??;
        if !valid {
            tracing::warn!(user_id = %user.id, "login with wrong password");
            return Err(ApiError::Unauthorized(
                "Invalid login or password".to_string(),
            ));
        }

        self.tokens.issue(user.id)
    }

    pub fn list_records(&self, user_id: Uuid) -> Result<Vec<RecordRow>, ApiError> {
        self.storage.list_records(user_id)
    }

    pub fn get_record(&self, user_id: Uuid, id: Uuid) -> Result<RecordRow, ApiError> {
        self.storage
            .get_record(user_id, id)?
            .ok_or_else(|| ApiError::NotFound(format!("record {}", id)))
    }

    pub fn save_record(&self, user_id: Uuid, record: &RecordRow) -> Result<(), ApiError> {
        let result = self.storage.save_record(user_id, record);
        match &result {
            Ok(()) => tracing::debug!(%user_id, record_id = %record.id, version = record.version, "record saved"),
            Err(ApiError::Conflict(_)) => {
                tracing::info!(%user_id, record_id = %record.id, version = record.version, "stale record version rejected")
            }
            Err(_) => {}
        }
        result
    }

    pub fn delete_record(&self, user_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        self.storage.delete_record(user_id, id)?;
        tracing::debug!(%user_id, record_id = %id, "record deleted");
        Ok(())
    }
}

fn validate_credentials(login: &str, password: &str) -> Result<(), ApiError> {
    if login.trim().is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest(
            "login and password must not be empty".to_string(),
        ));
    }
    Ok(())
}
