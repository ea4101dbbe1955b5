//! Background lock-expiry sweeper.
//!
//! Periodically releases locks whose expiry has passed, through the same
//! versioned path as an explicit unlock. A sweep that loses a race simply
//! leaves the lock for the next tick.

use std::io;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info};

use stockledger_events::{EventBus, EventEnvelope};

use crate::service::{InventoryService, ServiceResult, SweepReport};
use crate::store::InventoryStore;

/// Sweeper runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweeperStats {
    pub sweeps: u64,
    pub released: u64,
    pub conflicts: u64,
    pub skipped: u64,
    /// Sweeps aborted by a storage failure.
    pub failures: u64,
    pub last_sweep_at: Option<DateTime<Utc>>,
}

impl SweeperStats {
    fn record(&mut self, report: &SweepReport, at: DateTime<Utc>) {
        self.sweeps += 1;
        self.released += report.released as u64;
        self.conflicts += report.conflicts as u64;
        self.skipped += report.skipped as u64;
        self.last_sweep_at = Some(at);
    }
}

/// Handle to control a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<SweeperStats>>,
}

impl SweeperHandle {
    /// Stop after the current sweep and wait for the thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                error!("lock expiry sweeper thread panicked");
            }
        }
    }

    pub fn stats(&self) -> SweeperStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

pub struct LockExpirySweeper<S, B> {
    service: Arc<InventoryService<S, B>>,
}

impl<S, B> LockExpirySweeper<S, B>
where
    S: InventoryStore + 'static,
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
{
    pub fn new(service: Arc<InventoryService<S, B>>) -> Self {
        Self { service }
    }

    /// One sweep at `now`. Used by the background loop and by tests.
    pub fn run_once(&self, now: DateTime<Utc>) -> ServiceResult<SweepReport> {
        self.service.release_expired(now)
    }

    /// Run a sweep every `interval` on a dedicated thread until the handle
    /// is shut down.
    pub fn spawn(self, interval: Duration) -> io::Result<SweeperHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(SweeperStats::default()));
        let stats_clone = stats.clone();

        let join = thread::Builder::new()
            .name("lock-expiry-sweeper".to_string())
            .spawn(move || sweep_loop(self, interval, shutdown_rx, stats_clone))?;

        Ok(SweeperHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn sweep_loop<S, B>(
    sweeper: LockExpirySweeper<S, B>,
    interval: Duration,
    shutdown: mpsc::Receiver<()>,
    stats: Arc<Mutex<SweeperStats>>,
) where
    S: InventoryStore + 'static,
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
{
    info!(?interval, "lock expiry sweeper started");

    loop {
        match shutdown.recv_timeout(interval) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        let now = Utc::now();
        let outcome = sweeper.run_once(now);
        let Ok(mut s) = stats.lock() else {
            error!("sweeper stats poisoned; stopping");
            break;
        };
        match outcome {
            Ok(report) => {
                debug!(released = report.released, "sweep tick");
                s.record(&report, now);
            }
            Err(e) => {
                error!(error = %e, "expiry sweep failed");
                s.failures += 1;
                s.last_sweep_at = Some(now);
            }
        }
    }

    info!("lock expiry sweeper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use stockledger_core::{ProductId, TenantId, WarehouseId};
    use stockledger_events::InMemoryEventBus;
    use stockledger_inventory::{IncreaseStock, LockStock, SourceRef, StockLockId};

    use crate::config::EngineConfig;
    use crate::store::InMemoryInventoryStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Service = InventoryService<Arc<InMemoryInventoryStore>, Bus>;

    fn service() -> Arc<Service> {
        let config = EngineConfig::default();
        let registry = Arc::new(config.build_registry().unwrap());
        Arc::new(InventoryService::new(
            Arc::new(InMemoryInventoryStore::new()),
            Arc::new(InMemoryEventBus::new()),
            registry,
            config,
        ))
    }

    fn lock_with_expiry(service: &Service, expire_at: DateTime<Utc>) -> (TenantId, StockLockId) {
        let tenant_id = TenantId::new();
        let warehouse_id = WarehouseId::new();
        let product_id = ProductId::new();
        let at = expire_at - chrono::Duration::hours(1);
        service
            .increase_stock(&IncreaseStock {
                tenant_id,
                warehouse_id,
                product_id,
                quantity: dec!(10),
                unit_cost: dec!(1),
                source: SourceRef::new("purchase_order", "PO-1").unwrap(),
                reference: None,
                batch: None,
                occurred_at: at,
            })
            .unwrap();
        let lock = service
            .lock_stock(&LockStock {
                tenant_id,
                warehouse_id,
                product_id,
                quantity: dec!(4),
                source: SourceRef::new("sales_order", "SO-1").unwrap(),
                expire_at: Some(expire_at),
                occurred_at: at,
            })
            .unwrap();
        (tenant_id, lock.id_typed())
    }

    #[test]
    fn run_once_releases_expired_locks() {
        let service = service();
        let expiry = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let (tenant_id, lock_id) = lock_with_expiry(&service, expiry);

        let sweeper = LockExpirySweeper::new(service.clone());
        let early = sweeper.run_once(expiry - chrono::Duration::minutes(1)).unwrap();
        assert_eq!(early.released, 0);

        let late = sweeper.run_once(expiry + chrono::Duration::minutes(1)).unwrap();
        assert_eq!(late.released, 1);
        assert!(service.get_lock(tenant_id, lock_id).unwrap().is_released());
    }

    #[test]
    fn spawned_sweeper_releases_and_shuts_down() {
        let service = service();
        let (tenant_id, lock_id) =
            lock_with_expiry(&service, Utc::now() - chrono::Duration::seconds(5));

        let handle = LockExpirySweeper::new(service.clone())
            .spawn(Duration::from_millis(10))
            .unwrap();

        let mut released = false;
        for _ in 0..200 {
            if handle.stats().released >= 1 {
                released = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let stats = handle.stats();
        handle.shutdown();

        assert!(released, "sweeper never released the lock: {stats:?}");
        assert!(stats.sweeps >= 1);
        assert_eq!(stats.failures, 0);
        assert!(service.get_lock(tenant_id, lock_id).unwrap().is_released());
    }
}
