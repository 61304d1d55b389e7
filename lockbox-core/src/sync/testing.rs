//! In-memory gateway double for engine, scheduler and vault tests.

use crate::crypto::{encrypt_record, UserKey};
use crate::gateway::{PutOutcome, RecordGateway, RemoteRecord, ServerInfo};
use crate::record::Record;
use crate::session::fake_token;
use crate::{ErrorKind, LockboxError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Gateway calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    List,
    Get,
    Put,
    Delete,
    Register,
    Login,
}

fn make_error(kind: ErrorKind) -> LockboxError {
    let message = "injected failure".to_string();
    match kind {
        ErrorKind::Validation => LockboxError::Validation(message),
        ErrorKind::Authentication => LockboxError::Authentication(message),
        ErrorKind::Authorization => LockboxError::Authorization(message),
        ErrorKind::NotFound => LockboxError::NotFound(message),
        ErrorKind::Conflict => LockboxError::Conflict(message),
        ErrorKind::UnexpectedResponse => LockboxError::UnexpectedResponse(message),
        ErrorKind::Network => LockboxError::Network(message),
        ErrorKind::Internal => LockboxError::Config(message),
    }
}

/// Record service held in memory, with the same version rules as the server.
#[derive(Default)]
pub struct MemoryGateway {
    records: Mutex<HashMap<Uuid, RemoteRecord>>,
    users: Mutex<HashMap<String, (String, Uuid)>>,
    failures: Mutex<HashMap<GatewayOp, ErrorKind>>,
    list_delay: Mutex<Duration>,
    list_calls: AtomicUsize,
    put_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: GatewayOp, kind: ErrorKind) {
        self.failures.lock().unwrap().insert(op, kind);
    }

    pub fn heal(&self, op: GatewayOp) {
        self.failures.lock().unwrap().remove(&op);
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn remote(&self, id: Uuid) -> Option<RemoteRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn remote_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Seal a plaintext record and store it remotely at `version`.
    pub fn insert_sealed(&self, record: &Record, key: &UserKey, version: u64) {
        let mut sealed = encrypt_record(record, key).unwrap();
        sealed.version = version;
        self.insert_remote(RemoteRecord::from_sealed(&sealed));
    }

    pub fn insert_remote(&self, remote: RemoteRecord) {
        self.records.lock().unwrap().insert(remote.id, remote);
    }

    pub fn remove_remote(&self, id: Uuid) {
        self.records.lock().unwrap().remove(&id);
    }

    fn check(&self, op: GatewayOp) -> Result<()> {
        match self.failures.lock().unwrap().get(&op) {
            Some(kind) => Err(make_error(*kind)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordGateway for MemoryGateway {
    async fn list_records(&self) -> Result<Vec<RemoteRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.list_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check(GatewayOp::List)?;
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn get_record(&self, id: Uuid) -> Result<RemoteRecord> {
        self.check(GatewayOp::Get)?;
        self.remote(id)
            .ok_or_else(|| LockboxError::NotFound(format!("record {}", id)))
    }

    async fn put_record(&self, record: &RemoteRecord) -> Result<PutOutcome> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.check(GatewayOp::Put)?;
        if record.version < 1 {
            return Err(LockboxError::Validation("version must be positive".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        if record.version > 1 {
            match records.get(&record.id) {
                Some(current) if record.version == current.version + 1 => {}
                _ => return Ok(PutOutcome::Conflict),
            }
        }
        records.insert(record.id, record.clone());
        Ok(PutOutcome::Accepted)
    }

    async fn delete_record(&self, id: Uuid) -> Result<()> {
        self.check(GatewayOp::Delete)?;
        self.records.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn register(&self, login: &str, password: &str) -> Result<String> {
        self.check(GatewayOp::Register)?;
        let mut users = self.users.lock().unwrap();
        if users.contains_key(login) {
            return Err(LockboxError::LoginTaken);
        }
        let user_id = Uuid::new_v4();
        users.insert(login.to_string(), (password.to_string(), user_id));
        Ok(fake_token(user_id))
    }

    async fn login(&self, login: &str, password: &str) -> Result<String> {
        self.check(GatewayOp::Login)?;
        match self.users.lock().unwrap().get(login) {
            Some((stored, user_id)) if stored == password => Ok(fake_token(*user_id)),
            _ => Err(LockboxError::Authorization("invalid credentials".to_string())),
        }
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        Ok(ServerInfo {
            build_version: Some("test".to_string()),
            build_date: None,
        })
    }
}
