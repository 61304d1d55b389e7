//! Sync engine: orchestrates the fetch/pull/push cycle and single-record
//! operations against the remote gateway.
//!
//! Local state is only written after a definitive remote outcome, except for
//! the idempotent pre-marking of records as pending or deleted. Re-running a
//! cycle after any failure is therefore always safe.
//!
//! Cycles and single-record mutations take one operation lock, so an edit
//! made while the scheduler runs a cycle waits for the cycle to finish.

use crate::crypto::{decrypt_record, encrypt_record, UserKey};
use crate::gateway::{PutOutcome, RecordGateway, RemoteRecord};
use crate::record::{Record, RecordData, RecordStatus};
use crate::store::RecordStore;
use crate::sync::conflict::{ConflictResolver, PullAction, Resolution};
use crate::{LockboxError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Attempts at drawing an unused record id before giving up.
pub const MAX_ID_ATTEMPTS: usize = 5;

type IdSource = Box<dyn Fn() -> Uuid + Send + Sync>;

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Remote records adopted locally.
    pub pulled: usize,
    /// Pending records accepted by the server.
    pub pushed: usize,
    /// Records removed locally after remote deletion.
    pub deleted: usize,
    /// Whether any local record is left in conflict.
    pub has_conflicts: bool,
}

/// Reconciles the local store of one user with the remote service.
pub struct SyncEngine {
    gateway: Arc<dyn RecordGateway>,
    store: Arc<RecordStore>,
    key: UserKey,
    id_source: IdSource,
    op_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(gateway: Arc<dyn RecordGateway>, store: Arc<RecordStore>, key: UserKey) -> Self {
        Self {
            gateway,
            store,
            key,
            id_source: Box::new(Uuid::new_v4),
            op_lock: Mutex::new(()),
        }
    }

    /// Replace the record id generator.
    pub fn with_id_source<F>(mut self, id_source: F) -> Self
    where
        F: Fn() -> Uuid + Send + Sync + 'static,
    {
        self.id_source = Box::new(id_source);
        self
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn RecordGateway> {
        &self.gateway
    }

    /// Run one full cycle: fetch the remote set, pull, then push.
    pub async fn sync(&self) -> Result<SyncReport> {
        let _op = self.op_lock.lock().await;
        let remote = self.fetch_remote().await?;
        let pulled = self.pull(&remote)?;
        let (pushed, deleted) = self.push(&remote).await?;
        let has_conflicts = self.has_conflicts()?;

        let report = SyncReport {
            pulled,
            pushed,
            deleted,
            has_conflicts,
        };
        info!(
            pulled,
            pushed,
            deleted,
            has_conflicts,
            remote = remote.len(),
            "sync cycle complete"
        );
        Ok(report)
    }

    /// List and decrypt every remote record.
    ///
    /// Any decryption failure aborts before local state is touched.
    pub async fn fetch_remote(&self) -> Result<Vec<Record>> {
        let remote = self.gateway.list_records().await?;
        debug!(count = remote.len(), "fetched remote records");

        remote
            .into_iter()
            .map(|r| {
                let id = r.id;
                decrypt_record(&r.into_sealed(RecordStatus::Synced), &self.key).map_err(|e| {
                    warn!(record_id = %id, "remote record failed to decrypt");
                    LockboxError::from(e)
                })
            })
            .collect()
    }

    /// Apply the remote set to the local store. Returns the number adopted.
    fn pull(&self, remote: &[Record]) -> Result<usize> {
        let mut adopted = 0;

        for remote_record in remote {
            let local = self.store.get_by_id(remote_record.id)?;

            match ConflictResolver::on_pull(local.as_ref(), remote_record.version) {
                PullAction::Adopt => {
                    let unchanged = local.as_ref().is_some_and(|l| {
                        l.version == remote_record.version && l.payload == remote_record.payload
                    });
                    if !unchanged {
                        let mut record = remote_record.clone();
                        record.status = RecordStatus::Synced;
                        self.store.save(&record)?;
                        adopted += 1;
                    }
                }
                PullAction::Skip => {}
                PullAction::MarkConflict => {
                    if let Some(mut record) = local {
                        warn!(
                            record_id = %record.id,
                            local_version = record.version,
                            remote_version = remote_record.version,
                            "local record ahead of server, marking conflict"
                        );
                        record.status = RecordStatus::Conflict;
                        self.store.save(&record)?;
                    }
                }
            }
        }

        Ok(adopted)
    }

    /// Push local changes given the remote set fetched for this cycle.
    ///
    /// Returns `(pushed, deleted)`. The first error aborts the phase.
    async fn push(&self, remote: &[Record]) -> Result<(usize, usize)> {
        let remote_ids: HashSet<Uuid> = remote.iter().map(|r| r.id).collect();
        let mut pushed = 0;
        let mut deleted = 0;

        for record in self.store.get_all()? {
            match record.status {
                RecordStatus::Pending => {
                    let record = self.push_pending(record).await?;
                    if record.status == RecordStatus::Synced {
                        pushed += 1;
                    }
                }
                RecordStatus::Deleted => {
                    self.forget(&record).await?;
                    deleted += 1;
                }
                RecordStatus::Synced | RecordStatus::Conflict => {
                    if !remote_ids.contains(&record.id)
                        && ConflictResolver::deleted_remotely(&record)
                    {
                        debug!(record_id = %record.id, "record gone from server");
                        self.forget(&record).await?;
                        deleted += 1;
                    }
                }
            }
        }

        Ok((pushed, deleted))
    }

    /// Send one pending record and persist the outcome.
    ///
    /// The returned record is synced when the server accepted the version
    /// and in conflict when it did not.
    async fn push_pending(&self, mut record: Record) -> Result<Record> {
        let sealed = encrypt_record(&record, &self.key)?;
        let outcome = self
            .gateway
            .put_record(&RemoteRecord::from_sealed(&sealed))
            .await?;

        record.status = match outcome {
            PutOutcome::Accepted => RecordStatus::Synced,
            PutOutcome::Conflict => {
                warn!(record_id = %record.id, version = record.version, "server rejected version");
                RecordStatus::Conflict
            }
        };
        self.store.save(&record)?;
        debug!(record_id = %record.id, version = record.version, status = record.status.as_str(), "pushed record");

        Ok(record)
    }

    /// Create a new record from `data` and push it.
    pub async fn create_record(&self, data: &RecordData) -> Result<Record> {
        let _op = self.op_lock.lock().await;
        let id = self.new_record_id()?;
        let record = Record::new(id, data)?;
        self.save_and_push(record).await
    }

    /// Save a local edit and push it.
    ///
    /// The version advances only when the current one has been seen by the
    /// server; a record that is still pending keeps its version. The record
    /// is stored as pending before the network call, so a failed push is
    /// retried by the next cycle.
    ///
    /// Deleted records and records in conflict are rejected; a conflict is
    /// only settled through [`SyncEngine::resolve_conflict`].
    pub async fn push_record(&self, record: Record) -> Result<Record> {
        let _op = self.op_lock.lock().await;

        let stored = self.store.get_by_id(record.id)?.map(|r| r.status);
        for status in [Some(record.status), stored].into_iter().flatten() {
            match status {
                RecordStatus::Deleted => {
                    return Err(LockboxError::Validation(format!(
                        "record {} is deleted",
                        record.id
                    )))
                }
                RecordStatus::Conflict => {
                    return Err(LockboxError::Validation(format!(
                        "record {} is in conflict, resolve it first",
                        record.id
                    )))
                }
                RecordStatus::Pending | RecordStatus::Synced => {}
            }
        }

        self.save_and_push(record).await
    }

    async fn save_and_push(&self, mut record: Record) -> Result<Record> {
        if record.version_observed() {
            record.version += 1;
        }
        record.status = RecordStatus::Pending;
        self.store.save(&record)?;

        self.push_pending(record).await
    }

    /// Delete a record locally and remotely.
    ///
    /// The local tombstone stays until the server confirms the deletion.
    pub async fn forget_record(&self, record: &Record) -> Result<()> {
        let _op = self.op_lock.lock().await;
        self.forget(record).await
    }

    async fn forget(&self, record: &Record) -> Result<()> {
        if record.status != RecordStatus::Deleted {
            let mut tombstone = record.clone();
            tombstone.status = RecordStatus::Deleted;
            self.store.save(&tombstone)?;
        }

        self.gateway.delete_record(record.id).await?;
        self.store.delete(record.id)?;
        debug!(record_id = %record.id, "record deleted");

        Ok(())
    }

    /// Fetch and decrypt the server copy of one record. Not persisted.
    pub async fn pull_record(&self, id: Uuid) -> Result<Record> {
        let remote = self.gateway.get_record(id).await?;
        Ok(decrypt_record(
            &remote.into_sealed(RecordStatus::Synced),
            &self.key,
        )?)
    }

    /// Settle a record in conflict.
    ///
    /// Returns the resulting local record, or `None` when taking the remote
    /// side means the record no longer exists.
    pub async fn resolve_conflict(&self, id: Uuid, resolution: Resolution) -> Result<Option<Record>> {
        let _op = self.op_lock.lock().await;
        let mut local = self
            .store
            .get_by_id(id)?
            .ok_or_else(|| LockboxError::NotFound(format!("record {}", id)))?;
        if local.status != RecordStatus::Conflict {
            return Err(LockboxError::Validation(format!(
                "record {} is not in conflict",
                id
            )));
        }

        let remote = match self.pull_record(id).await {
            Ok(remote) => Some(remote),
            Err(LockboxError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        info!(record_id = %id, ?resolution, remote_exists = remote.is_some(), "resolving conflict");

        match (resolution, remote) {
            (Resolution::KeepLocal, Some(remote)) => {
                // Rebased on the observed server version, so the push presents remote + 1.
                local.version = remote.version;
                local.status = RecordStatus::Synced;
                Ok(Some(self.save_and_push(local).await?))
            }
            (Resolution::KeepLocal, None) => {
                local.version = 0;
                local.status = RecordStatus::Pending;
                Ok(Some(self.save_and_push(local).await?))
            }
            (Resolution::TakeRemote, Some(remote)) => {
                self.store.save(&remote)?;
                Ok(Some(remote))
            }
            (Resolution::TakeRemote, None) => {
                self.store.delete(id)?;
                Ok(None)
            }
        }
    }

    /// Draw a record id not present in the local store.
    pub fn new_record_id(&self) -> Result<Uuid> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = (self.id_source)();
            if !self.store.exists(id)? {
                return Ok(id);
            }
        }
        Err(LockboxError::IdExhausted(MAX_ID_ATTEMPTS))
    }

    /// Whether any local record is in conflict.
    pub fn has_conflicts(&self) -> Result<bool> {
        Ok(self
            .store
            .get_all()?
            .iter()
            .any(|r| r.status == RecordStatus::Conflict))
    }
}
