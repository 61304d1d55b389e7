//! Vault facade: account access plus record CRUD and sync for one user.

use crate::crypto::{derive_user_key, CryptoError, UserKey};
use crate::gateway::{RecordGateway, ServerInfo};
use crate::record::{Record, RecordData, RecordStatus};
use crate::session::Session;
use crate::store::RecordStore;
use crate::sync::{Resolution, SyncEngine, SyncReport};
use crate::{LockboxError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// An unlocked vault bound to one account.
pub struct Vault {
    engine: Arc<SyncEngine>,
    session: Session,
    user_id: Uuid,
}

impl Vault {
    /// Create an account and open its (new) local store.
    pub async fn register(
        gateway: Arc<dyn RecordGateway>,
        session: Session,
        data_dir: &Path,
        login: &str,
        password: &str,
    ) -> Result<Self> {
        validate_credentials(login, password)?;
        let token = gateway.register(login, password).await?;
        info!(login, "account registered");
        Self::unlock(gateway, session, data_dir, login, password, token).await
    }

    /// Log in and open the account's local store.
    pub async fn login(
        gateway: Arc<dyn RecordGateway>,
        session: Session,
        data_dir: &Path,
        login: &str,
        password: &str,
    ) -> Result<Self> {
        validate_credentials(login, password)?;
        let token = gateway.login(login, password).await?;
        info!(login, "logged in");
        Self::unlock(gateway, session, data_dir, login, password, token).await
    }

    async fn unlock(
        gateway: Arc<dyn RecordGateway>,
        session: Session,
        data_dir: &Path,
        login: &str,
        password: &str,
        token: String,
    ) -> Result<Self> {
        let user_id = session.set_token(token)?;

        let key = derive_key(user_id, login, password).await?;
        let store_key = key.store_key()?;

        std::fs::create_dir_all(data_dir).map_err(|e| {
            LockboxError::Config(format!("Cannot create {}: {}", data_dir.display(), e))
        })?;
        let store = RecordStore::open(data_dir.join(format!("{}.db", user_id)), store_key)?;
        // Fail now rather than on the first sync if the store key is wrong.
        store.get_all()?;

        let engine = SyncEngine::new(gateway, Arc::new(store), key);
        Ok(Self::open(engine, session, user_id))
    }

    /// Wrap an already built engine.
    pub fn open(engine: SyncEngine, session: Session, user_id: Uuid) -> Self {
        Self {
            engine: Arc::new(engine),
            session,
            user_id,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Live records, excluding tombstones.
    pub fn records(&self) -> Result<Vec<Record>> {
        Ok(self
            .engine
            .store()
            .get_all()?
            .into_iter()
            .filter(|r| r.status != RecordStatus::Deleted)
            .collect())
    }

    pub fn record(&self, id: Uuid) -> Result<Record> {
        self.engine
            .store()
            .get_by_id(id)?
            .filter(|r| r.status != RecordStatus::Deleted)
            .ok_or_else(|| LockboxError::NotFound(format!("record {}", id)))
    }

    pub async fn create(&self, data: &RecordData) -> Result<Record> {
        self.engine.create_record(data).await
    }

    /// Replace the content of a record and push it.
    ///
    /// A record in conflict must be settled with [`Vault::resolve_conflict`] first.
    pub async fn update(&self, id: Uuid, data: &RecordData) -> Result<Record> {
        let mut record = self.record(id)?;
        record.set_data(data)?;
        self.engine.push_record(record).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let record = self
            .engine
            .store()
            .get_by_id(id)?
            .ok_or_else(|| LockboxError::NotFound(format!("record {}", id)))?;
        self.engine.forget_record(&record).await
    }

    pub async fn sync(&self) -> Result<SyncReport> {
        self.engine.sync().await
    }

    /// The server's copy of a record, for comparison during resolution.
    pub async fn pull_record(&self, id: Uuid) -> Result<Record> {
        self.engine.pull_record(id).await
    }

    pub async fn resolve_conflict(&self, id: Uuid, resolution: Resolution) -> Result<Option<Record>> {
        self.engine.resolve_conflict(id, resolution).await
    }

    pub async fn server_info(&self) -> Result<ServerInfo> {
        self.engine.gateway().server_info().await
    }

    /// Shared handle to the engine, e.g. for [`crate::SyncScheduler::spawn`].
    pub fn engine(&self) -> Arc<SyncEngine> {
        Arc::clone(&self.engine)
    }

    pub fn into_engine(self) -> Arc<SyncEngine> {
        self.engine
    }

    /// Forget the session token. Local data stays on disk, encrypted.
    pub fn logout(self) {
        self.session.clear();
    }
}

fn validate_credentials(login: &str, password: &str) -> Result<()> {
    if login.is_empty() || password.is_empty() {
        return Err(LockboxError::Validation(
            "login and password are required".to_string(),
        ));
    }
    Ok(())
}

/// Runs the KDF on the blocking pool.
async fn derive_key(user_id: Uuid, login: &str, password: &str) -> Result<UserKey> {
    let login = login.to_string();
    let password = zeroize::Zeroizing::new(password.as_bytes().to_vec());
    let key = tokio::task::spawn_blocking(move || {
        derive_user_key(&user_id.to_string(), &login, &password)
    })
    .await
    .map_err(|e| CryptoError::KdfFailed(format!("Key derivation task failed: {}", e)))??;
    Ok(key)
}
