use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use stockledger_core::{ExpectedVersion, ProductId, TenantId, WarehouseId};
use stockledger_inventory::{
    InventoryItem, InventoryItemId, InventoryTransaction, SourceRef, StockLock, StockLockId,
    StockTaking, StockTakingId, StockTakingStatus, TransactionFilter, TransactionId,
};

/// Storage operation error.
///
/// These are infrastructure errors, as opposed to domain errors (validation,
/// lifecycle). Services fold them into the domain taxonomy where a caller can
/// act on them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency check failed on an aggregate write.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A uniqueness constraint (natural key, taking number, id) was violated.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A lock was resolved by a concurrent writer after it was loaded.
    #[error("stock lock {0} was already resolved")]
    LockResolved(StockLockId),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Write of a stock lock within a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockWrite {
    /// A new lock. The id must be unused.
    Insert(StockLock),
    /// A released or consumed lock. The stored lock must still be unresolved.
    Resolve(StockLock),
}

impl LockWrite {
    pub fn lock(&self) -> &StockLock {
        match self {
            LockWrite::Insert(lock) | LockWrite::Resolve(lock) => lock,
        }
    }
}

/// Everything one operation writes, committed all-or-nothing.
///
/// Item and stock-taking writes carry the version they were loaded at;
/// ledger entries are append-only and carry no expectation.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    pub items: Vec<(InventoryItem, ExpectedVersion)>,
    pub locks: Vec<LockWrite>,
    pub transactions: Vec<InventoryTransaction>,
    pub stock_takings: Vec<(StockTaking, ExpectedVersion)>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write back `item`, expecting the store to hold it at `loaded_version`.
    pub fn put_item(&mut self, item: InventoryItem, loaded_version: u64) -> &mut Self {
        self.items
            .push((item, ExpectedVersion::from_loaded(loaded_version)));
        self
    }

    pub fn insert_lock(&mut self, lock: StockLock) -> &mut Self {
        self.locks.push(LockWrite::Insert(lock));
        self
    }

    pub fn resolve_lock(&mut self, lock: StockLock) -> &mut Self {
        self.locks.push(LockWrite::Resolve(lock));
        self
    }

    pub fn append(&mut self, transaction: InventoryTransaction) -> &mut Self {
        self.transactions.push(transaction);
        self
    }

    pub fn put_stock_taking(&mut self, taking: StockTaking, loaded_version: u64) -> &mut Self {
        self.stock_takings
            .push((taking, ExpectedVersion::from_loaded(loaded_version)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
            && self.locks.is_empty()
            && self.transactions.is_empty()
            && self.stock_takings.is_empty()
    }
}

/// Tenant-scoped storage for the inventory engine.
///
/// ## Guarantees implementations must provide
///
/// - **Atomic commit**: every write in a [`UnitOfWork`] lands, or none does.
/// - **Optimistic concurrency**: item and stock-taking writes are compared
///   against the stored version; a mismatch fails with
///   [`StoreError::Concurrency`] and nothing is written.
/// - **Single resolution**: a [`LockWrite::Resolve`] against a lock that is
///   already released or consumed fails with [`StoreError::LockResolved`].
///   This check runs before the item version check, so the loser of a race
///   between sweep, unlock and deduct learns the lock is gone.
/// - **Uniqueness**: at most one item per (tenant, warehouse, product), one
///   stock taking per (tenant, taking number).
/// - **Append-only ledger**: transactions are returned in commit order and
///   never updated or removed.
/// - **Tenant isolation**: reads for another tenant's records return nothing.
pub trait InventoryStore: Send + Sync {
    fn item(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<Option<InventoryItem>, StoreError>;

    fn item_by_id(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Option<InventoryItem>, StoreError>;

    fn items(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError>;

    fn lock(
        &self,
        tenant_id: TenantId,
        lock_id: StockLockId,
    ) -> Result<Option<StockLock>, StoreError>;

    fn locks_for_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Vec<StockLock>, StoreError>;

    fn locks_by_source(
        &self,
        tenant_id: TenantId,
        source: &SourceRef,
    ) -> Result<Vec<StockLock>, StoreError>;

    /// Unresolved locks whose expiry is before `now`, across all tenants,
    /// oldest expiry first.
    fn expired_locks(&self, now: DateTime<Utc>, limit: usize)
    -> Result<Vec<StockLock>, StoreError>;

    /// Ledger entries matching `filter`, in commit order.
    fn transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
    ) -> Result<Vec<InventoryTransaction>, StoreError>;

    fn transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<Option<InventoryTransaction>, StoreError>;

    fn stock_taking(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
    ) -> Result<Option<StockTaking>, StoreError>;

    fn stock_taking_by_number(
        &self,
        tenant_id: TenantId,
        taking_number: &str,
    ) -> Result<Option<StockTaking>, StoreError>;

    fn stock_takings(
        &self,
        tenant_id: TenantId,
        status: Option<StockTakingStatus>,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<StockTaking>, StoreError>;

    /// Reserve the next stock-taking sequence number for `(tenant, date)`,
    /// starting at 1.
    fn next_taking_sequence(&self, tenant_id: TenantId, date: NaiveDate)
    -> Result<u32, StoreError>;

    fn commit(&self, work: UnitOfWork) -> Result<(), StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn item(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        (**self).item(tenant_id, warehouse_id, product_id)
    }

    fn item_by_id(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        (**self).item_by_id(tenant_id, item_id)
    }

    fn items(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError> {
        (**self).items(tenant_id)
    }

    fn lock(
        &self,
        tenant_id: TenantId,
        lock_id: StockLockId,
    ) -> Result<Option<StockLock>, StoreError> {
        (**self).lock(tenant_id, lock_id)
    }

    fn locks_for_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Vec<StockLock>, StoreError> {
        (**self).locks_for_item(tenant_id, item_id)
    }

    fn locks_by_source(
        &self,
        tenant_id: TenantId,
        source: &SourceRef,
    ) -> Result<Vec<StockLock>, StoreError> {
        (**self).locks_by_source(tenant_id, source)
    }

    fn expired_locks(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StockLock>, StoreError> {
        (**self).expired_locks(now, limit)
    }

    fn transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
    ) -> Result<Vec<InventoryTransaction>, StoreError> {
        (**self).transactions(tenant_id, filter)
    }

    fn transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<Option<InventoryTransaction>, StoreError> {
        (**self).transaction(tenant_id, transaction_id)
    }

    fn stock_taking(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
    ) -> Result<Option<StockTaking>, StoreError> {
        (**self).stock_taking(tenant_id, taking_id)
    }

    fn stock_taking_by_number(
        &self,
        tenant_id: TenantId,
        taking_number: &str,
    ) -> Result<Option<StockTaking>, StoreError> {
        (**self).stock_taking_by_number(tenant_id, taking_number)
    }

    fn stock_takings(
        &self,
        tenant_id: TenantId,
        status: Option<StockTakingStatus>,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<StockTaking>, StoreError> {
        (**self).stock_takings(tenant_id, status, warehouse_id)
    }

    fn next_taking_sequence(
        &self,
        tenant_id: TenantId,
        date: NaiveDate,
    ) -> Result<u32, StoreError> {
        (**self).next_taking_sequence(tenant_id, date)
    }

    fn commit(&self, work: UnitOfWork) -> Result<(), StoreError> {
        (**self).commit(work)
    }
}
