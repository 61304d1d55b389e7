//! Background sync scheduler.
//!
//! One task owns the cycle loop. A cycle starts on every interval tick and on
//! explicit triggers; triggers that arrive while a cycle runs collapse into a
//! single follow-up cycle, so two cycles never overlap. The outcome of each
//! cycle is published as a [`SyncHealth`] snapshot on a watch channel.
//!
//! Shutdown uses a `CancellationToken`; an in-flight cycle is dropped, which
//! is safe because the engine only writes local state after a definitive
//! remote outcome.

use crate::sync::engine::{SyncEngine, SyncReport};
use crate::{ErrorKind, LockboxError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default interval between periodic cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// Default deadline for one whole cycle.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a notice stays relevant.
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

/// A transient error message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub raised_at: Instant,
}

impl Notice {
    fn new(message: String) -> Self {
        Self {
            message,
            raised_at: Instant::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.raised_at.elapsed() >= NOTICE_TTL
    }
}

/// Snapshot of sync state for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncHealth {
    /// False after a cycle failed to reach the server.
    pub online: bool,
    /// True while any record is in conflict.
    pub needs_resolution: bool,
    pub notice: Option<Notice>,
    pub last_report: Option<SyncReport>,
    /// Completed cycles, successful or not.
    pub cycles: u64,
}

impl Default for SyncHealth {
    fn default() -> Self {
        Self {
            online: true,
            needs_resolution: false,
            notice: None,
            last_report: None,
            cycles: 0,
        }
    }
}

impl SyncHealth {
    /// The notice, if it has not yet expired.
    pub fn active_notice(&self) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| !n.is_expired())
    }
}

/// Timing knobs for [`SyncScheduler`].
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub interval: Duration,
    pub cycle_timeout: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
        }
    }
}

/// Handle to the background sync task.
pub struct SyncScheduler {
    trigger: Arc<Notify>,
    health: watch::Receiver<SyncHealth>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawn the sync loop on the current runtime.
    ///
    /// The first cycle starts immediately.
    pub fn spawn(
        engine: Arc<SyncEngine>,
        options: SchedulerOptions,
        shutdown: CancellationToken,
    ) -> Self {
        let trigger = Arc::new(Notify::new());
        let (health_tx, health) = watch::channel(SyncHealth::default());

        let handle = tokio::spawn(run(
            engine,
            options,
            Arc::clone(&trigger),
            health_tx,
            shutdown.clone(),
        ));

        Self {
            trigger,
            health,
            shutdown,
            handle,
        }
    }

    /// Request a cycle as soon as possible.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Subscribe to health updates.
    pub fn health(&self) -> watch::Receiver<SyncHealth> {
        self.health.clone()
    }

    /// Stop the loop and wait for the task to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "sync task ended abnormally");
        }
    }
}

async fn run(
    engine: Arc<SyncEngine>,
    options: SchedulerOptions,
    trigger: Arc<Notify>,
    health: watch::Sender<SyncHealth>,
    shutdown: CancellationToken,
) {
    info!(
        interval_secs = options.interval.as_secs(),
        "sync scheduler starting"
    );

    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => debug!("periodic sync"),
            _ = trigger.notified() => debug!("triggered sync"),
        }

        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            outcome = tokio::time::timeout(options.cycle_timeout, engine.sync()) => outcome,
        };

        let result = outcome.unwrap_or_else(|_| {
            Err(LockboxError::Network("sync cycle timed out".to_string()))
        });
        publish(&engine, &health, result);

        ticker.reset();
    }

    info!("sync scheduler shutting down");
}

fn publish(
    engine: &SyncEngine,
    health: &watch::Sender<SyncHealth>,
    result: crate::Result<SyncReport>,
) {
    match result {
        Ok(report) => health.send_modify(|h| {
            h.online = true;
            h.needs_resolution = report.has_conflicts;
            h.last_report = Some(report);
            h.cycles += 1;
        }),
        Err(e) => {
            warn!(error = %e, "sync cycle failed");
            let conflicts = engine.has_conflicts().unwrap_or(false);
            health.send_modify(|h| {
                match e.kind() {
                    ErrorKind::Network => h.online = false,
                    ErrorKind::Conflict => {
                        h.online = true;
                        h.needs_resolution = true;
                    }
                    _ => {
                        h.online = true;
                        h.notice = Some(Notice::new(e.to_string()));
                    }
                }
                h.needs_resolution |= conflicts;
                h.cycles += 1;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::UserKey;
    use crate::record::{Record, RecordData, RecordStatus};
    use crate::store::RecordStore;
    use crate::sync::testing::{GatewayOp, MemoryGateway};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn engine(gateway: Arc<MemoryGateway>) -> Arc<SyncEngine> {
        let key = UserKey::from_bytes([3u8; 32]);
        let store = RecordStore::in_memory(key.store_key().unwrap()).unwrap();
        Arc::new(SyncEngine::new(gateway, Arc::new(store), key))
    }

    fn options() -> SchedulerOptions {
        SchedulerOptions {
            interval: Duration::from_secs(3600),
            cycle_timeout: Duration::from_secs(30),
        }
    }

    async fn wait_cycles(health: &mut watch::Receiver<SyncHealth>, n: u64) -> SyncHealth {
        health.wait_for(|h| h.cycles >= n).await.unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn triggers_during_a_cycle_coalesce() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.set_list_delay(Duration::from_millis(100));

        let scheduler = SyncScheduler::spawn(
            engine(Arc::clone(&gateway)),
            options(),
            CancellationToken::new(),
        );

        // Let the first cycle reach the slow list call.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.list_calls(), 1);
        for _ in 0..5 {
            scheduler.trigger();
        }

        let mut health = scheduler.health();
        wait_cycles(&mut health, 2).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(gateway.list_calls(), 2);
        assert_eq!(gateway.max_in_flight(), 1);
        assert_eq!(health.borrow().cycles, 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn interval_runs_periodic_cycles() {
        let gateway = Arc::new(MemoryGateway::new());
        let scheduler = SyncScheduler::spawn(
            engine(Arc::clone(&gateway)),
            SchedulerOptions {
                interval: DEFAULT_SYNC_INTERVAL,
                cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
            },
            CancellationToken::new(),
        );

        let mut health = scheduler.health();
        let snapshot = wait_cycles(&mut health, 3).await;
        assert!(snapshot.online);
        assert_eq!(snapshot.last_report, Some(SyncReport::default()));

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_goes_offline_and_recovers() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.fail(GatewayOp::List, ErrorKind::Network);

        let scheduler = SyncScheduler::spawn(
            engine(Arc::clone(&gateway)),
            options(),
            CancellationToken::new(),
        );
        let mut health = scheduler.health();

        let snapshot = wait_cycles(&mut health, 1).await;
        assert!(!snapshot.online);
        assert!(snapshot.notice.is_none());

        gateway.heal(GatewayOp::List);
        scheduler.trigger();
        let snapshot = wait_cycles(&mut health, 2).await;
        assert!(snapshot.online);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycle_times_out_as_offline() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.set_list_delay(Duration::from_secs(60));

        let scheduler = SyncScheduler::spawn(
            engine(Arc::clone(&gateway)),
            options(),
            CancellationToken::new(),
        );
        let mut health = scheduler.health();

        let snapshot = wait_cycles(&mut health, 1).await;
        assert!(!snapshot.online);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_raise_expiring_notice() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.fail(GatewayOp::List, ErrorKind::Authorization);

        let scheduler = SyncScheduler::spawn(
            engine(Arc::clone(&gateway)),
            options(),
            CancellationToken::new(),
        );
        let mut health = scheduler.health();

        let snapshot = wait_cycles(&mut health, 1).await;
        assert!(snapshot.online);
        assert!(snapshot.active_notice().is_some());

        tokio::time::sleep(NOTICE_TTL).await;
        assert!(snapshot.active_notice().is_none());

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn conflicts_need_resolution() {
        let gateway = Arc::new(MemoryGateway::new());
        let engine = engine(Arc::clone(&gateway));

        let data = RecordData::Text {
            text: "mine".to_string(),
            metadata: BTreeMap::new(),
        };
        let mut record = Record::new(Uuid::new_v4(), &data).unwrap();
        record.version = 2;
        record.status = RecordStatus::Synced;
        engine.store().save(&record).unwrap();
        gateway.insert_sealed(&record, &UserKey::from_bytes([3u8; 32]), 1);

        let scheduler = SyncScheduler::spawn(engine, options(), CancellationToken::new());
        let mut health = scheduler.health();

        let snapshot = wait_cycles(&mut health, 1).await;
        assert!(snapshot.needs_resolution);
        assert_eq!(snapshot.last_report.map(|r| r.has_conflicts), Some(true));

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let gateway = Arc::new(MemoryGateway::new());
        let token = CancellationToken::new();
        let scheduler = SyncScheduler::spawn(
            engine(Arc::clone(&gateway)),
            options(),
            token.clone(),
        );
        let mut health = scheduler.health();
        wait_cycles(&mut health, 1).await;

        scheduler.shutdown().await;
        assert!(token.is_cancelled());

        let calls = gateway.list_calls();
        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(gateway.list_calls(), calls);
    }
}
