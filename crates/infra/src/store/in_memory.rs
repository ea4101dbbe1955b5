use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};

use stockledger_core::{AggregateRoot, ExpectedVersion, ProductId, TenantId, WarehouseId};
use stockledger_inventory::{
    InventoryItem, InventoryItemId, InventoryTransaction, SourceRef, StockLock, StockLockId,
    StockTaking, StockTakingId, StockTakingStatus, TransactionFilter, TransactionId,
};

use super::r#trait::{InventoryStore, LockWrite, StoreError, UnitOfWork};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct ItemKey {
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    product_id: ProductId,
}

impl ItemKey {
    fn of(item: &InventoryItem) -> Self {
        Self {
            tenant_id: item.tenant_id(),
            warehouse_id: item.warehouse_id(),
            product_id: item.product_id(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    items: HashMap<InventoryItemId, InventoryItem>,
    item_keys: HashMap<ItemKey, InventoryItemId>,
    locks: HashMap<StockLockId, StockLock>,
    ledger: Vec<InventoryTransaction>,
    ledger_index: HashMap<TransactionId, usize>,
    takings: HashMap<StockTakingId, StockTaking>,
    taking_numbers: HashMap<(TenantId, String), StockTakingId>,
    taking_sequences: HashMap<(TenantId, NaiveDate), u32>,
}

/// In-memory inventory store.
///
/// Intended for tests/dev and single-process deployments. A single
/// `RwLock` over all tables makes every commit atomic and serializable.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

fn work_tenant(work: &UnitOfWork) -> Option<TenantId> {
    work.items
        .first()
        .map(|(item, _)| item.tenant_id())
        .or_else(|| work.locks.first().map(|w| w.lock().tenant_id()))
        .or_else(|| work.transactions.first().map(|tx| tx.tenant_id))
        .or_else(|| work.stock_takings.first().map(|(t, _)| t.tenant_id()))
}

fn check_tenant(expected: TenantId, actual: TenantId, what: &str) -> Result<(), StoreError> {
    if expected != actual {
        return Err(StoreError::TenantIsolation(format!(
            "unit of work mixes tenants ({what})"
        )));
    }
    Ok(())
}

impl State {
    /// Every check a commit needs, without touching any table.
    fn validate(&self, work: &UnitOfWork, tenant_id: TenantId) -> Result<(), StoreError> {
        for write in &work.locks {
            let lock = write.lock();
            check_tenant(tenant_id, lock.tenant_id(), "lock")?;
            let stored = self.locks.get(&lock.id_typed());
            match write {
                LockWrite::Insert(_) => {
                    if stored.is_some() {
                        return Err(StoreError::Duplicate(format!(
                            "stock lock {}",
                            lock.id_typed()
                        )));
                    }
                }
                LockWrite::Resolve(_) => {
                    let stored = stored.ok_or_else(|| {
                        StoreError::Backend(format!("unknown stock lock {}", lock.id_typed()))
                    })?;
                    if stored.is_terminal() {
                        return Err(StoreError::LockResolved(lock.id_typed()));
                    }
                }
            }
        }

        for (item, expected) in &work.items {
            check_tenant(tenant_id, item.tenant_id(), "item")?;
            let current = self.items.get(&item.id_typed()).map(|i| i.version());
            if !expected.matches(current) {
                return Err(StoreError::Concurrency(format!(
                    "inventory item {}: expected {expected:?}, found {current:?}",
                    item.id_typed()
                )));
            }
            if let Some(existing) = self.item_keys.get(&ItemKey::of(item)) {
                if *existing != item.id_typed() {
                    // Lost a get-or-create race; a re-read finds the winner.
                    return Err(StoreError::Concurrency(format!(
                        "inventory item for warehouse {} / product {} already exists",
                        item.warehouse_id(),
                        item.product_id()
                    )));
                }
            }
        }

        for (taking, expected) in &work.stock_takings {
            check_tenant(tenant_id, taking.tenant_id(), "stock taking")?;
            let current = self.takings.get(&taking.id_typed()).map(|t| t.version());
            if !expected.matches(current) {
                return Err(StoreError::Concurrency(format!(
                    "stock taking {}: expected {expected:?}, found {current:?}",
                    taking.taking_number()
                )));
            }
            if *expected == ExpectedVersion::NoAggregate
                && self
                    .taking_numbers
                    .contains_key(&(tenant_id, taking.taking_number().to_string()))
            {
                return Err(StoreError::Duplicate(format!(
                    "stock taking number {}",
                    taking.taking_number()
                )));
            }
        }

        for tx in &work.transactions {
            check_tenant(tenant_id, tx.tenant_id, "transaction")?;
            if self.ledger_index.contains_key(&tx.id) {
                return Err(StoreError::Duplicate(format!("transaction {}", tx.id)));
            }
        }

        Ok(())
    }

    fn apply(&mut self, work: UnitOfWork) {
        for write in work.locks {
            let lock = match write {
                LockWrite::Insert(lock) | LockWrite::Resolve(lock) => lock,
            };
            self.locks.insert(lock.id_typed(), lock);
        }
        for (item, _) in work.items {
            self.item_keys.insert(ItemKey::of(&item), item.id_typed());
            self.items.insert(item.id_typed(), item);
        }
        for (taking, _) in work.stock_takings {
            self.taking_numbers.insert(
                (taking.tenant_id(), taking.taking_number().to_string()),
                taking.id_typed(),
            );
            self.takings.insert(taking.id_typed(), taking);
        }
        for tx in work.transactions {
            self.ledger_index.insert(tx.id, self.ledger.len());
            self.ledger.push(tx);
        }
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn item(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let state = self.read()?;
        let key = ItemKey {
            tenant_id,
            warehouse_id,
            product_id,
        };
        Ok(state
            .item_keys
            .get(&key)
            .and_then(|id| state.items.get(id))
            .cloned())
    }

    fn item_by_id(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let state = self.read()?;
        Ok(state
            .items
            .get(&item_id)
            .filter(|i| i.tenant_id() == tenant_id)
            .cloned())
    }

    fn items(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError> {
        let state = self.read()?;
        let mut items: Vec<_> = state
            .items
            .values()
            .filter(|i| i.tenant_id() == tenant_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.id_typed());
        Ok(items)
    }

    fn lock(
        &self,
        tenant_id: TenantId,
        lock_id: StockLockId,
    ) -> Result<Option<StockLock>, StoreError> {
        let state = self.read()?;
        Ok(state
            .locks
            .get(&lock_id)
            .filter(|l| l.tenant_id() == tenant_id)
            .cloned())
    }

    fn locks_for_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Vec<StockLock>, StoreError> {
        let state = self.read()?;
        let mut locks: Vec<_> = state
            .locks
            .values()
            .filter(|l| l.tenant_id() == tenant_id && l.item_id() == item_id)
            .cloned()
            .collect();
        locks.sort_by_key(|l| (l.created_at(), l.id_typed()));
        Ok(locks)
    }

    fn locks_by_source(
        &self,
        tenant_id: TenantId,
        source: &SourceRef,
    ) -> Result<Vec<StockLock>, StoreError> {
        let state = self.read()?;
        let mut locks: Vec<_> = state
            .locks
            .values()
            .filter(|l| l.tenant_id() == tenant_id && l.source() == source)
            .cloned()
            .collect();
        locks.sort_by_key(|l| (l.created_at(), l.id_typed()));
        Ok(locks)
    }

    fn expired_locks(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StockLock>, StoreError> {
        let state = self.read()?;
        let mut locks: Vec<_> = state
            .locks
            .values()
            .filter(|l| !l.is_terminal() && l.is_expired_at(now))
            .cloned()
            .collect();
        locks.sort_by_key(|l| (l.expire_at(), l.id_typed()));
        locks.truncate(limit);
        Ok(locks)
    }

    fn transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
    ) -> Result<Vec<InventoryTransaction>, StoreError> {
        let state = self.read()?;
        Ok(state
            .ledger
            .iter()
            .filter(|tx| tx.tenant_id == tenant_id && filter.matches(tx))
            .cloned()
            .collect())
    }

    fn transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<Option<InventoryTransaction>, StoreError> {
        let state = self.read()?;
        Ok(state
            .ledger_index
            .get(&transaction_id)
            .and_then(|idx| state.ledger.get(*idx))
            .filter(|tx| tx.tenant_id == tenant_id)
            .cloned())
    }

    fn stock_taking(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
    ) -> Result<Option<StockTaking>, StoreError> {
        let state = self.read()?;
        Ok(state
            .takings
            .get(&taking_id)
            .filter(|t| t.tenant_id() == tenant_id)
            .cloned())
    }

    fn stock_taking_by_number(
        &self,
        tenant_id: TenantId,
        taking_number: &str,
    ) -> Result<Option<StockTaking>, StoreError> {
        let state = self.read()?;
        Ok(state
            .taking_numbers
            .get(&(tenant_id, taking_number.to_string()))
            .and_then(|id| state.takings.get(id))
            .cloned())
    }

    fn stock_takings(
        &self,
        tenant_id: TenantId,
        status: Option<StockTakingStatus>,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<StockTaking>, StoreError> {
        let state = self.read()?;
        let mut takings: Vec<_> = state
            .takings
            .values()
            .filter(|t| t.tenant_id() == tenant_id)
            .filter(|t| status.is_none_or(|s| t.status() == s))
            .filter(|t| warehouse_id.is_none_or(|w| t.warehouse_id() == w))
            .cloned()
            .collect();
        takings.sort_by(|a, b| a.taking_number().cmp(b.taking_number()));
        Ok(takings)
    }

    fn next_taking_sequence(
        &self,
        tenant_id: TenantId,
        date: NaiveDate,
    ) -> Result<u32, StoreError> {
        let mut state = self.write()?;
        let seq = state.taking_sequences.entry((tenant_id, date)).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    fn commit(&self, work: UnitOfWork) -> Result<(), StoreError> {
        let Some(tenant_id) = work_tenant(&work) else {
            return Ok(());
        };
        let mut state = self.write()?;
        state.validate(&work, tenant_id)?;
        state.apply(work);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use stockledger_inventory::{IncreaseStock, LockStock, UnlockStock};

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn source() -> SourceRef {
        SourceRef::new("purchase_order", "PO-1").unwrap()
    }

    /// A freshly opened item with `qty` received, plus the unit of work that
    /// persists it.
    fn received(tenant_id: TenantId, qty: rust_decimal::Decimal) -> (InventoryItem, UnitOfWork) {
        let mut item = InventoryItem::open(tenant_id, WarehouseId::new(), ProductId::new(), t0());
        let loaded = item.version();
        let change = item
            .increase_stock(&IncreaseStock {
                tenant_id,
                warehouse_id: item.warehouse_id(),
                product_id: item.product_id(),
                quantity: qty,
                unit_cost: dec!(10),
                source: source(),
                reference: None,
                batch: None,
                occurred_at: t0(),
            })
            .unwrap();
        let mut work = UnitOfWork::new();
        work.put_item(item.clone(), loaded).append(change.transaction);
        (item, work)
    }

    fn lock_on(item: &mut InventoryItem, qty: rust_decimal::Decimal) -> (StockLock, UnitOfWork) {
        let loaded = item.version();
        let (lock, change) = item
            .lock_stock(&LockStock {
                tenant_id: item.tenant_id(),
                warehouse_id: item.warehouse_id(),
                product_id: item.product_id(),
                quantity: qty,
                source: SourceRef::new("sales_order", "SO-1").unwrap(),
                expire_at: None,
                occurred_at: t0(),
            })
            .unwrap();
        let mut work = UnitOfWork::new();
        work.put_item(item.clone(), loaded)
            .insert_lock(lock.clone())
            .append(change.transaction);
        (lock, work)
    }

    #[test]
    fn commit_then_read_back_by_key_and_id() {
        let store = InMemoryInventoryStore::new();
        let tenant_id = test_tenant_id();
        let (item, work) = received(tenant_id, dec!(5));
        store.commit(work).unwrap();

        let by_key = store
            .item(tenant_id, item.warehouse_id(), item.product_id())
            .unwrap()
            .unwrap();
        assert_eq!(by_key, item);
        assert!(store.item_by_id(tenant_id, item.id_typed()).unwrap().is_some());
        assert_eq!(
            store
                .transactions(tenant_id, &TransactionFilter::for_item(item.id_typed()))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn stale_version_is_rejected_and_nothing_is_written() {
        let store = InMemoryInventoryStore::new();
        let tenant_id = test_tenant_id();
        let (item, work) = received(tenant_id, dec!(5));
        store.commit(work).unwrap();

        let mut first = item.clone();
        let mut second = item.clone();
        let (_, first_work) = lock_on(&mut first, dec!(1));
        let (_, second_work) = lock_on(&mut second, dec!(2));

        store.commit(first_work).unwrap();
        let err = store.commit(second_work).unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));

        let stored = store.item_by_id(tenant_id, item.id_typed()).unwrap().unwrap();
        assert_eq!(stored.locked_quantity().value(), dec!(1));
        assert_eq!(
            store
                .transactions(tenant_id, &TransactionFilter::default())
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn lost_create_race_is_a_concurrency_conflict() {
        let store = InMemoryInventoryStore::new();
        let tenant_id = test_tenant_id();
        let (item, work) = received(tenant_id, dec!(5));
        store.commit(work).unwrap();

        let mut twin = InventoryItem::open(tenant_id, item.warehouse_id(), item.product_id(), t0());
        twin.increase_stock(&IncreaseStock {
            tenant_id,
            warehouse_id: item.warehouse_id(),
            product_id: item.product_id(),
            quantity: dec!(1),
            unit_cost: dec!(1),
            source: source(),
            reference: None,
            batch: None,
            occurred_at: t0(),
        })
        .unwrap();
        let mut work = UnitOfWork::new();
        work.put_item(twin, 0);
        assert!(matches!(store.commit(work), Err(StoreError::Concurrency(_))));
    }

    #[test]
    fn resolving_a_resolved_lock_reports_lock_resolved() {
        let store = InMemoryInventoryStore::new();
        let tenant_id = test_tenant_id();
        let (mut item, work) = received(tenant_id, dec!(5));
        store.commit(work).unwrap();
        let (lock, work) = lock_on(&mut item, dec!(2));
        store.commit(work).unwrap();

        let unlock = |mut item: InventoryItem, mut lock: StockLock| {
            let loaded = item.version();
            let cmd = UnlockStock {
                tenant_id,
                lock_id: lock.id_typed(),
                reason: None,
                occurred_at: t0(),
            };
            let change = item.unlock_stock(&mut lock, &cmd).unwrap();
            let mut work = UnitOfWork::new();
            work.resolve_lock(lock)
                .put_item(item, loaded)
                .append(change.transaction);
            work
        };

        store.commit(unlock(item.clone(), lock.clone())).unwrap();
        let err = store.commit(unlock(item, lock.clone())).unwrap_err();
        assert!(matches!(err, StoreError::LockResolved(id) if id == lock.id_typed()));
    }

    #[test]
    fn other_tenants_see_nothing() {
        let store = InMemoryInventoryStore::new();
        let tenant_id = test_tenant_id();
        let (mut item, work) = received(tenant_id, dec!(5));
        store.commit(work).unwrap();
        let (lock, work) = lock_on(&mut item, dec!(2));
        store.commit(work).unwrap();

        let other = test_tenant_id();
        assert!(store
            .item(other, item.warehouse_id(), item.product_id())
            .unwrap()
            .is_none());
        assert!(store.lock(other, lock.id_typed()).unwrap().is_none());
        assert!(store
            .transactions(other, &TransactionFilter::default())
            .unwrap()
            .is_empty());
        assert!(store.items(other).unwrap().is_empty());
    }

    #[test]
    fn mixed_tenant_work_is_rejected() {
        let store = InMemoryInventoryStore::new();
        let (_, mut work) = received(test_tenant_id(), dec!(5));
        let (_, other) = received(test_tenant_id(), dec!(1));
        work.items.extend(other.items);
        assert!(matches!(
            store.commit(work),
            Err(StoreError::TenantIsolation(_))
        ));
    }

    #[test]
    fn expired_locks_are_listed_oldest_first() {
        let store = InMemoryInventoryStore::new();
        let tenant_id = test_tenant_id();
        let (mut item, work) = received(tenant_id, dec!(10));
        store.commit(work).unwrap();

        for (n, mins) in [(1, 20), (2, 10)] {
            let loaded = item.version();
            let (lock, change) = item
                .lock_stock(&LockStock {
                    tenant_id,
                    warehouse_id: item.warehouse_id(),
                    product_id: item.product_id(),
                    quantity: dec!(1),
                    source: SourceRef::new("sales_order", format!("SO-{n}")).unwrap(),
                    expire_at: Some(t0() + chrono::Duration::minutes(mins)),
                    occurred_at: t0(),
                })
                .unwrap();
            let mut work = UnitOfWork::new();
            work.put_item(item.clone(), loaded)
                .insert_lock(lock)
                .append(change.transaction);
            store.commit(work).unwrap();
        }

        let expired = store
            .expired_locks(t0() + chrono::Duration::hours(1), 10)
            .unwrap();
        assert_eq!(expired.len(), 2);
        assert_eq!(expired[0].source().source_id(), "SO-2");
        assert!(store.expired_locks(t0(), 10).unwrap().is_empty());
        assert_eq!(
            store
                .expired_locks(t0() + chrono::Duration::hours(1), 1)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn taking_sequences_are_per_tenant_per_day() {
        let store = InMemoryInventoryStore::new();
        let tenant_id = test_tenant_id();
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(store.next_taking_sequence(tenant_id, day).unwrap(), 1);
        assert_eq!(store.next_taking_sequence(tenant_id, day).unwrap(), 2);
        assert_eq!(
            store
                .next_taking_sequence(tenant_id, day.succ_opt().unwrap())
                .unwrap(),
            1
        );
        assert_eq!(store.next_taking_sequence(test_tenant_id(), day).unwrap(), 1);
    }
}
