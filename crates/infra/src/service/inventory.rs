use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, info_span, warn};

use stockledger_core::{
    AggregateRoot, DomainError, DomainResult, ErrorKind, ProductId, Quantity, TenantId,
    WarehouseId, checked_total,
};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{
    AdjustStock, Availability, DeductStock, IncreaseStock, InventoryItem, InventoryItemId,
    InventoryTransaction, LockStock, SetThresholds, SourceRef, StockChange, StockLock,
    StockLockId, TransactionFilter, TransactionId, UnlockStock, rebuild_total, verify_continuity,
};
use stockledger_strategy::StrategyRegistry;

use super::{ITEM_AGGREGATE, ServiceError, ServiceResult, publish};
use crate::config::EngineConfig;
use crate::store::{InventoryStore, LockWrite, UnitOfWork};

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub released: usize,
    /// Item changed concurrently; the lock is picked up again next sweep.
    pub conflicts: usize,
    /// Lock resolved concurrently or no longer releasable.
    pub skipped: usize,
}

/// Inventory ledger and reservation operations.
///
/// Every mutation is one load-decide-commit round trip against a single
/// item. Operations on different items never contend.
pub struct InventoryService<S, B> {
    store: S,
    bus: B,
    strategies: Arc<StrategyRegistry>,
    config: EngineConfig,
}

impl<S, B> InventoryService<S, B> {
    pub fn new(store: S, bus: B, strategies: Arc<StrategyRegistry>, config: EngineConfig) -> Self {
        Self {
            store,
            bus,
            strategies,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<S, B> InventoryService<S, B>
where
    S: InventoryStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn load_or_open(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> ServiceResult<InventoryItem> {
        Ok(self
            .store
            .item(tenant_id, warehouse_id, product_id)?
            .unwrap_or_else(|| InventoryItem::open(tenant_id, warehouse_id, product_id, at)))
    }

    fn load_item(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> ServiceResult<InventoryItem> {
        self.store
            .item(tenant_id, warehouse_id, product_id)?
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "inventory item for warehouse {warehouse_id} / product {product_id}"
                ))
                .into()
            })
    }

    fn load_lock(&self, tenant_id: TenantId, lock_id: StockLockId) -> ServiceResult<StockLock> {
        self.store
            .lock(tenant_id, lock_id)?
            .ok_or_else(|| DomainError::not_found(format!("stock lock {lock_id}")).into())
    }

    fn load_item_by_id(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> ServiceResult<InventoryItem> {
        self.store
            .item_by_id(tenant_id, item_id)?
            .ok_or_else(|| DomainError::not_found(format!("inventory item {item_id}")).into())
    }

    /// Commit one item mutation with its ledger entry, then publish.
    fn commit_change(
        &self,
        item: &InventoryItem,
        loaded_version: u64,
        change: StockChange,
        lock: Option<LockWrite>,
    ) -> ServiceResult<InventoryTransaction> {
        let mut work = UnitOfWork::new();
        work.locks.extend(lock);
        work.put_item(item.clone(), loaded_version)
            .append(change.transaction.clone());
        self.store.commit(work)?;

        debug!(
            item_id = %item.id_typed(),
            version = item.version(),
            transaction_type = %change.transaction.transaction_type,
            "committed"
        );
        publish(
            &self.bus,
            item.tenant_id(),
            item.id_typed().as_aggregate_id(),
            ITEM_AGGREGATE,
            item.version(),
            change.events,
        );
        Ok(change.transaction)
    }

    /// Receive stock. Creates the item on first movement.
    pub fn increase_stock(&self, cmd: &IncreaseStock) -> ServiceResult<InventoryItem> {
        let span = info_span!(
            "inventory.increase_stock",
            tenant_id = %cmd.tenant_id,
            warehouse_id = %cmd.warehouse_id,
            product_id = %cmd.product_id
        );
        let _guard = span.enter();

        let mut item =
            self.load_or_open(cmd.tenant_id, cmd.warehouse_id, cmd.product_id, cmd.occurred_at)?;
        let loaded = item.version();
        let change = item.increase_stock(cmd)?;
        self.commit_change(&item, loaded, change, None)?;
        Ok(item)
    }

    /// Reserve stock. Requests without an expiry get the configured default
    /// TTL, if any.
    pub fn lock_stock(&self, cmd: &LockStock) -> ServiceResult<StockLock> {
        let span = info_span!(
            "inventory.lock_stock",
            tenant_id = %cmd.tenant_id,
            warehouse_id = %cmd.warehouse_id,
            product_id = %cmd.product_id,
            source = %cmd.source
        );
        let _guard = span.enter();

        let mut item = self.load_item(cmd.tenant_id, cmd.warehouse_id, cmd.product_id)?;
        let loaded = item.version();

        let mut cmd = cmd.clone();
        if cmd.expire_at.is_none() {
            if let Some(ttl) = self.config.default_lock_ttl() {
                let expire_at = cmd.occurred_at.checked_add_signed(ttl).ok_or_else(|| {
                    DomainError::invalid_input(format!(
                        "default lock ttl of {}s runs past the supported time range",
                        ttl.num_seconds()
                    ))
                })?;
                cmd.expire_at = Some(expire_at);
            }
        }

        let (lock, change) = item.lock_stock(&cmd)?;
        self.commit_change(&item, loaded, change, Some(LockWrite::Insert(lock.clone())))?;
        Ok(lock)
    }

    pub fn unlock_stock(&self, cmd: &UnlockStock) -> ServiceResult<()> {
        let span = info_span!(
            "inventory.unlock_stock",
            tenant_id = %cmd.tenant_id,
            lock_id = %cmd.lock_id
        );
        let _guard = span.enter();

        let mut lock = self.load_lock(cmd.tenant_id, cmd.lock_id)?;
        let mut item = self.load_item_by_id(cmd.tenant_id, lock.item_id())?;
        let loaded = item.version();
        let change = item.unlock_stock(&mut lock, cmd)?;
        self.commit_change(&item, loaded, change, Some(LockWrite::Resolve(lock)))?;
        Ok(())
    }

    /// Consume a lock. Batch and cost strategies resolve explicit name, then
    /// tenant override, then family default.
    pub fn deduct_stock(&self, cmd: &DeductStock) -> ServiceResult<InventoryTransaction> {
        let span = info_span!(
            "inventory.deduct_stock",
            tenant_id = %cmd.tenant_id,
            lock_id = %cmd.lock_id
        );
        let _guard = span.enter();

        let mut lock = self.load_lock(cmd.tenant_id, cmd.lock_id)?;
        let mut item = self.load_item_by_id(cmd.tenant_id, lock.item_id())?;
        let batches = self
            .strategies
            .batch(cmd.tenant_id, cmd.batch_strategy.as_deref())?;
        let costing = self
            .strategies
            .cost(cmd.tenant_id, cmd.cost_strategy.as_deref())?;

        let loaded = item.version();
        let change = item.deduct_stock(&mut lock, cmd, &*batches, &*costing)?;
        self.commit_change(&item, loaded, change, Some(LockWrite::Resolve(lock)))
    }

    /// Set the total to a counted quantity. A zero difference writes nothing.
    pub fn adjust_stock(&self, cmd: &AdjustStock) -> ServiceResult<InventoryItem> {
        let span = info_span!(
            "inventory.adjust_stock",
            tenant_id = %cmd.tenant_id,
            warehouse_id = %cmd.warehouse_id,
            product_id = %cmd.product_id
        );
        let _guard = span.enter();

        let mut item =
            self.load_or_open(cmd.tenant_id, cmd.warehouse_id, cmd.product_id, cmd.occurred_at)?;
        let loaded = item.version();
        if let Some(change) = item.adjust_stock(cmd)? {
            self.commit_change(&item, loaded, change, None)?;
        }
        Ok(item)
    }

    pub fn set_thresholds(&self, cmd: &SetThresholds) -> ServiceResult<InventoryItem> {
        let span = info_span!(
            "inventory.set_thresholds",
            tenant_id = %cmd.tenant_id,
            warehouse_id = %cmd.warehouse_id,
            product_id = %cmd.product_id
        );
        let _guard = span.enter();

        let mut item = self.load_item(cmd.tenant_id, cmd.warehouse_id, cmd.product_id)?;
        let loaded = item.version();
        item.set_thresholds(cmd)?;

        let mut work = UnitOfWork::new();
        work.put_item(item.clone(), loaded);
        self.store.commit(work)?;
        debug!(item_id = %item.id_typed(), version = item.version(), "thresholds updated");
        Ok(item)
    }

    /// Pure read. An item that was never stocked has nothing available.
    pub fn check_availability(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: Decimal,
    ) -> ServiceResult<Availability> {
        match self.store.item(tenant_id, warehouse_id, product_id)? {
            Some(item) => Ok(item.check_availability(quantity)?),
            None => {
                Quantity::positive(quantity)?;
                Ok(Availability {
                    sufficient: false,
                    available: Quantity::ZERO,
                })
            }
        }
    }

    pub fn get_item(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> ServiceResult<InventoryItem> {
        self.load_item(tenant_id, warehouse_id, product_id)
    }

    pub fn get_item_by_id(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> ServiceResult<InventoryItem> {
        self.load_item_by_id(tenant_id, item_id)
    }

    pub fn items_below_minimum(&self, tenant_id: TenantId) -> ServiceResult<Vec<InventoryItem>> {
        Ok(self
            .store
            .items(tenant_id)?
            .into_iter()
            .filter(InventoryItem::is_below_minimum)
            .collect())
    }

    /// Stock value at current unit costs, optionally for one warehouse.
    pub fn total_value(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
    ) -> ServiceResult<Decimal> {
        let values = self
            .store
            .items(tenant_id)?
            .iter()
            .filter(|i| warehouse_id.is_none_or(|w| i.warehouse_id() == w))
            .map(InventoryItem::total_value)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(checked_total(values)?)
    }

    pub fn get_lock(&self, tenant_id: TenantId, lock_id: StockLockId) -> ServiceResult<StockLock> {
        self.load_lock(tenant_id, lock_id)
    }

    /// Locks that are neither resolved nor expired as of `now`.
    pub fn active_locks(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<StockLock>> {
        Ok(self
            .store
            .locks_for_item(tenant_id, item_id)?
            .into_iter()
            .filter(|l| l.is_active_at(now))
            .collect())
    }

    pub fn locks_by_source(
        &self,
        tenant_id: TenantId,
        source: &SourceRef,
    ) -> ServiceResult<Vec<StockLock>> {
        Ok(self.store.locks_by_source(tenant_id, source)?)
    }

    pub fn transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
    ) -> ServiceResult<Vec<InventoryTransaction>> {
        Ok(self.store.transactions(tenant_id, filter)?)
    }

    pub fn get_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> ServiceResult<InventoryTransaction> {
        self.store
            .transaction(tenant_id, transaction_id)?
            .ok_or_else(|| DomainError::not_found(format!("transaction {transaction_id}")).into())
    }

    /// Check the item's ledger chains from zero and replays to its current
    /// total. Returns the replayed total.
    pub fn verify_ledger(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> ServiceResult<Decimal> {
        let item = self.load_item_by_id(tenant_id, item_id)?;
        let entries = self
            .store
            .transactions(tenant_id, &TransactionFilter::for_item(item_id))?;

        if let Some(first) = entries.first() {
            if !first.balance_before.is_zero() {
                return Err(DomainError::invalid_state(format!(
                    "ledger for item {item_id} does not start at zero"
                ))
                .into());
            }
        }
        verify_continuity(&entries)?;

        let replayed = rebuild_total(&entries)?;
        if replayed != item.total_quantity().value() {
            return Err(DomainError::invalid_state(format!(
                "ledger replays to {replayed} but item {item_id} holds {}",
                item.total_quantity()
            ))
            .into());
        }
        Ok(replayed)
    }

    /// Release every unresolved lock whose expiry passed before `now`, up to
    /// the configured batch size. Each release is its own versioned commit,
    /// exactly like an explicit unlock.
    pub fn release_expired(&self, now: DateTime<Utc>) -> ServiceResult<SweepReport> {
        let span = info_span!("inventory.release_expired", %now);
        let _guard = span.enter();

        let expired = self.store.expired_locks(now, self.config.sweep_batch_size)?;
        let mut report = SweepReport {
            examined: expired.len(),
            ..SweepReport::default()
        };

        for lock in expired {
            let lock_id = lock.id_typed();
            match self.release_one(lock, now) {
                Ok(()) => report.released += 1,
                Err(ServiceError::Store(e)) => return Err(ServiceError::Store(e)),
                Err(e) if e.kind() == Some(ErrorKind::ConcurrencyConflict) => {
                    warn!(%lock_id, error = %e, "expired lock release conflicted; retrying next sweep");
                    report.conflicts += 1;
                }
                Err(e) => {
                    debug!(%lock_id, error = %e, "expired lock no longer releasable");
                    report.skipped += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                released = report.released,
                conflicts = report.conflicts,
                skipped = report.skipped,
                "expiry sweep finished"
            );
        }
        Ok(report)
    }

    fn release_one(&self, mut lock: StockLock, now: DateTime<Utc>) -> ServiceResult<()> {
        let mut item = self.load_item_by_id(lock.tenant_id(), lock.item_id())?;
        let loaded = item.version();
        let change = item.release_expired(&mut lock, now)?;
        let lock_id = lock.id_typed();
        self.commit_change(&item, loaded, change, Some(LockWrite::Resolve(lock)))?;
        info!(%lock_id, item_id = %item.id_typed(), "released expired lock");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use stockledger_events::InMemoryEventBus;
    use stockledger_inventory::{BatchInfo, TransactionType};

    use crate::store::InMemoryInventoryStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Service = InventoryService<Arc<InMemoryInventoryStore>, Bus>;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn service_with(config: EngineConfig) -> (Service, Bus) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let registry = Arc::new(config.build_registry().unwrap());
        let service = InventoryService::new(
            Arc::new(InMemoryInventoryStore::new()),
            bus.clone(),
            registry,
            config,
        );
        (service, bus)
    }

    fn service() -> (Service, Bus) {
        service_with(EngineConfig::default())
    }

    struct Key {
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    }

    fn key() -> Key {
        Key {
            tenant_id: test_tenant_id(),
            warehouse_id: WarehouseId::new(),
            product_id: ProductId::new(),
        }
    }

    fn receive(svc: &Service, k: &Key, qty: Decimal, cost: Decimal, batch: Option<BatchInfo>) {
        svc.increase_stock(&IncreaseStock {
            tenant_id: k.tenant_id,
            warehouse_id: k.warehouse_id,
            product_id: k.product_id,
            quantity: qty,
            unit_cost: cost,
            source: SourceRef::new("purchase_order", "PO-1").unwrap(),
            reference: None,
            batch,
            occurred_at: t0(),
        })
        .unwrap();
    }

    fn lock_cmd(k: &Key, qty: Decimal, expire_at: Option<DateTime<Utc>>) -> LockStock {
        LockStock {
            tenant_id: k.tenant_id,
            warehouse_id: k.warehouse_id,
            product_id: k.product_id,
            quantity: qty,
            source: SourceRef::new("sales_order", "SO-1").unwrap(),
            expire_at,
            occurred_at: t0(),
        }
    }

    fn deduct_cmd(k: &Key, lock_id: StockLockId) -> DeductStock {
        DeductStock {
            tenant_id: k.tenant_id,
            lock_id,
            source: SourceRef::new("sales_order", "SO-1").unwrap(),
            reference: None,
            batch_strategy: None,
            cost_strategy: None,
            occurred_at: t0() + Duration::minutes(1),
        }
    }

    #[test]
    fn increase_creates_item_and_publishes_after_commit() {
        let (svc, bus) = service();
        let sub = bus.subscribe();
        let k = key();
        receive(&svc, &k, dec!(100), dec!(10), None);

        let item = svc.get_item(k.tenant_id, k.warehouse_id, k.product_id).unwrap();
        assert_eq!(item.available_quantity().value(), dec!(100));
        assert_eq!(item.version(), 1);

        let published = sub.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_type(), "inventory.stock.increased");
        assert_eq!(published[0].aggregate_type(), ITEM_AGGREGATE);
        assert_eq!(published[0].aggregate_version(), 1);
    }

    #[test]
    fn lock_on_unknown_item_is_not_found() {
        let (svc, _bus) = service();
        let err = svc.lock_stock(&lock_cmd(&key(), dec!(1), None)).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn default_ttl_applies_only_without_explicit_expiry() {
        let (svc, _bus) = service_with(EngineConfig {
            default_lock_ttl_secs: Some(600),
            ..EngineConfig::default()
        });
        let k = key();
        receive(&svc, &k, dec!(10), dec!(1), None);

        let defaulted = svc.lock_stock(&lock_cmd(&k, dec!(1), None)).unwrap();
        assert_eq!(defaulted.expire_at(), Some(t0() + Duration::minutes(10)));

        let explicit = svc
            .lock_stock(&lock_cmd(&k, dec!(1), Some(t0() + Duration::hours(2))))
            .unwrap();
        assert_eq!(explicit.expire_at(), Some(t0() + Duration::hours(2)));
    }

    #[test]
    fn default_ttl_past_time_range_is_rejected() {
        let (svc, _bus) = service_with(EngineConfig {
            default_lock_ttl_secs: Some(i64::MAX as u64 / 1000),
            ..EngineConfig::default()
        });
        let k = key();
        receive(&svc, &k, dec!(10), dec!(1), None);

        let err = svc.lock_stock(&lock_cmd(&k, dec!(1), None)).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
        let item = svc.get_item(k.tenant_id, k.warehouse_id, k.product_id).unwrap();
        assert_eq!(item.locked_quantity(), Quantity::ZERO);

        let (unbounded, _bus) = service_with(EngineConfig {
            default_lock_ttl_secs: Some(u64::MAX / 2),
            ..EngineConfig::default()
        });
        receive(&unbounded, &k, dec!(10), dec!(1), None);
        let lock = unbounded.lock_stock(&lock_cmd(&k, dec!(1), None)).unwrap();
        assert_eq!(lock.expire_at(), None);
    }

    #[test]
    fn deduct_with_fifo_costing_draws_oldest_batch() {
        let (svc, _bus) = service();
        let k = key();
        let batch = |n: &str, day: u32| BatchInfo {
            batch_number: Some(n.to_string()),
            production_date: chrono::NaiveDate::from_ymd_opt(2024, 5, day),
            expiry_date: None,
        };
        receive(&svc, &k, dec!(10), dec!(4), Some(batch("B-1", 1)));
        receive(&svc, &k, dec!(10), dec!(6), Some(batch("B-2", 2)));

        let lock = svc.lock_stock(&lock_cmd(&k, dec!(5), None)).unwrap();
        let mut cmd = deduct_cmd(&k, lock.id_typed());
        cmd.cost_strategy = Some("fifo".to_string());
        let tx = svc.deduct_stock(&cmd).unwrap();

        assert_eq!(tx.transaction_type, TransactionType::Outbound);
        assert_eq!(tx.unit_cost, dec!(4));
        assert_eq!(tx.cost_method.as_deref(), Some("fifo"));
        assert!(tx.batch_id.is_some());

        let item = svc.get_item(k.tenant_id, k.warehouse_id, k.product_id).unwrap();
        assert_eq!(item.batches()[0].remaining.value(), dec!(5));
        assert_eq!(item.total_quantity().value(), dec!(15));
    }

    #[test]
    fn unknown_strategy_is_not_found_and_writes_nothing() {
        let (svc, _bus) = service();
        let k = key();
        receive(&svc, &k, dec!(10), dec!(1), None);
        let lock = svc.lock_stock(&lock_cmd(&k, dec!(2), None)).unwrap();

        let mut cmd = deduct_cmd(&k, lock.id_typed());
        cmd.batch_strategy = Some("lifo".to_string());
        assert_eq!(svc.deduct_stock(&cmd).unwrap_err().code(), "NOT_FOUND");
        assert!(!svc.get_lock(k.tenant_id, lock.id_typed()).unwrap().is_terminal());
    }

    #[test]
    fn adjust_with_zero_difference_writes_no_entry() {
        let (svc, _bus) = service();
        let k = key();
        receive(&svc, &k, dec!(10), dec!(1), None);
        let item = svc
            .adjust_stock(&AdjustStock {
                tenant_id: k.tenant_id,
                warehouse_id: k.warehouse_id,
                product_id: k.product_id,
                actual_quantity: dec!(10),
                reason: "recount".to_string(),
                source: SourceRef::new("manual", "ADJ-1").unwrap(),
                occurred_at: t0(),
            })
            .unwrap();
        assert_eq!(item.version(), 1);
        let entries = svc
            .transactions(k.tenant_id, &TransactionFilter::for_item(item.id_typed()))
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn thresholds_drive_below_minimum_listing() {
        let (svc, _bus) = service();
        let k = key();
        receive(&svc, &k, dec!(3), dec!(1), None);

        let thresholds = |min: Decimal| SetThresholds {
            tenant_id: k.tenant_id,
            warehouse_id: k.warehouse_id,
            product_id: k.product_id,
            min_quantity: Some(min),
            max_quantity: Some(dec!(100)),
            occurred_at: t0(),
        };
        svc.set_thresholds(&thresholds(dec!(5))).unwrap();
        assert_eq!(svc.items_below_minimum(k.tenant_id).unwrap().len(), 1);

        svc.set_thresholds(&thresholds(dec!(2))).unwrap();
        assert!(svc.items_below_minimum(k.tenant_id).unwrap().is_empty());

        let err = svc.set_thresholds(&thresholds(dec!(500))).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn availability_for_unstocked_product_is_zero() {
        let (svc, _bus) = service();
        let k = key();
        let availability = svc
            .check_availability(k.tenant_id, k.warehouse_id, k.product_id, dec!(1))
            .unwrap();
        assert!(!availability.sufficient);
        assert!(availability.available.is_zero());

        let err = svc
            .check_availability(k.tenant_id, k.warehouse_id, k.product_id, dec!(0))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn total_value_sums_items_per_warehouse() {
        let (svc, _bus) = service();
        let k = key();
        receive(&svc, &k, dec!(10), dec!(2.5), None);
        let other = Key {
            tenant_id: k.tenant_id,
            warehouse_id: WarehouseId::new(),
            product_id: k.product_id,
        };
        receive(&svc, &other, dec!(4), dec!(1), None);

        assert_eq!(svc.total_value(k.tenant_id, None).unwrap(), dec!(29));
        assert_eq!(
            svc.total_value(k.tenant_id, Some(k.warehouse_id)).unwrap(),
            dec!(25)
        );
    }

    #[test]
    fn sweep_releases_only_expired_locks() {
        let (svc, bus) = service();
        let k = key();
        receive(&svc, &k, dec!(10), dec!(1), None);
        let short = svc
            .lock_stock(&lock_cmd(&k, dec!(3), Some(t0() + Duration::minutes(5))))
            .unwrap();
        let long = svc
            .lock_stock(&lock_cmd(&k, dec!(2), Some(t0() + Duration::hours(5))))
            .unwrap();
        let sub = bus.subscribe();

        let report = svc.release_expired(t0() + Duration::minutes(30)).unwrap();
        assert_eq!(report.released, 1);
        assert_eq!(report.conflicts, 0);

        assert!(svc.get_lock(k.tenant_id, short.id_typed()).unwrap().is_released());
        let active = svc
            .active_locks(k.tenant_id, short.item_id(), t0() + Duration::minutes(30))
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id_typed(), long.id_typed());

        let item = svc.get_item(k.tenant_id, k.warehouse_id, k.product_id).unwrap();
        assert_eq!(item.available_quantity().value(), dec!(8));
        assert_eq!(item.locked_quantity().value(), dec!(2));

        let events = sub.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "inventory.lock.expired");

        let unlock = UnlockStock {
            tenant_id: k.tenant_id,
            lock_id: short.id_typed(),
            reason: None,
            occurred_at: t0() + Duration::minutes(31),
        };
        assert_eq!(svc.unlock_stock(&unlock).unwrap_err().code(), "INVALID_STATE");
    }

    #[test]
    fn ledger_verifies_after_mixed_operations() {
        let (svc, _bus) = service();
        let k = key();
        receive(&svc, &k, dec!(50), dec!(2), None);
        let lock = svc.lock_stock(&lock_cmd(&k, dec!(20), None)).unwrap();
        svc.deduct_stock(&deduct_cmd(&k, lock.id_typed())).unwrap();
        let lock = svc.lock_stock(&lock_cmd(&k, dec!(5), None)).unwrap();
        svc.unlock_stock(&UnlockStock {
            tenant_id: k.tenant_id,
            lock_id: lock.id_typed(),
            reason: Some("order cancelled".to_string()),
            occurred_at: t0(),
        })
        .unwrap();

        let replayed = svc.verify_ledger(k.tenant_id, lock.item_id()).unwrap();
        assert_eq!(replayed, dec!(30));

        let by_source = svc
            .locks_by_source(k.tenant_id, &SourceRef::new("sales_order", "SO-1").unwrap())
            .unwrap();
        assert_eq!(by_source.len(), 2);
    }
}
