use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    AggregateRoot, DomainError, DomainResult, ProductId, Quantity, TenantId, WarehouseId,
    ensure_cost, round_cost,
};
use stockledger_strategy::{BatchStrategy, CostStrategy};

use crate::batch::{BatchInfo, StockBatch};
use crate::events::{
    InventoryEvent, LockReleased, StockAdjusted, StockBelowMinimum, StockDeducted,
    StockIncreased, StockLocked,
};
use crate::ids::{InventoryItemId, StockBatchId, StockLockId, TransactionId};
use crate::lock::StockLock;
use crate::transaction::{InventoryTransaction, SourceRef, TransactionType};

/// Command: IncreaseStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncreaseStock {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub source: SourceRef,
    pub reference: Option<String>,
    pub batch: Option<BatchInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LockStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStock {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub source: SourceRef,
    pub expire_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UnlockStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockStock {
    pub tenant_id: TenantId,
    pub lock_id: StockLockId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeductStock.
///
/// Strategy names are optional; unset means tenant override, then default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductStock {
    pub tenant_id: TenantId,
    pub lock_id: StockLockId,
    pub source: SourceRef,
    pub reference: Option<String>,
    pub batch_strategy: Option<String>,
    pub cost_strategy: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock. Targets the item's total quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub actual_quantity: Decimal,
    pub reason: String,
    pub source: SourceRef,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetThresholds. `None` clears a threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetThresholds {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub min_quantity: Option<Decimal>,
    pub max_quantity: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Result of CheckAvailability.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub sufficient: bool,
    pub available: Quantity,
}

/// Ledger entry and events produced by one accepted mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub transaction: InventoryTransaction,
    pub events: Vec<InventoryEvent>,
}

/// Why a lock is being released.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReleaseCause {
    Unlock,
    Expiry,
}

/// Aggregate root: InventoryItem.
///
/// Holds available and locked quantity for one (tenant, warehouse, product)
/// plus the running weighted-average unit cost, thresholds and batches.
/// `available + locked` is the physically present total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: InventoryItemId,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    product_id: ProductId,
    available: Quantity,
    locked: Quantity,
    unit_cost: Decimal,
    min_quantity: Option<Quantity>,
    max_quantity: Option<Quantity>,
    batches: Vec<StockBatch>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// A fresh, never-persisted item (version 0, zero stock).
    pub fn open(
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InventoryItemId::generate(),
            tenant_id,
            warehouse_id,
            product_id,
            available: Quantity::ZERO,
            locked: Quantity::ZERO,
            unit_cost: Decimal::ZERO,
            min_quantity: None,
            max_quantity: None,
            batches: Vec::new(),
            version: 0,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn available_quantity(&self) -> Quantity {
        self.available
    }

    pub fn locked_quantity(&self) -> Quantity {
        self.locked
    }

    /// Every mutation that grows the total checks it against the decimal
    /// range first, so this sum never saturates for a live item.
    pub fn total_quantity(&self) -> Quantity {
        self.available.saturating_add(self.locked)
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn total_value(&self) -> DomainResult<Decimal> {
        self.total_quantity().checked_value_at(self.unit_cost)
    }

    pub fn min_quantity(&self) -> Option<Quantity> {
        self.min_quantity
    }

    pub fn max_quantity(&self) -> Option<Quantity> {
        self.max_quantity
    }

    pub fn is_below_minimum(&self) -> bool {
        self.min_quantity.is_some_and(|min| self.total_quantity() < min)
    }

    pub fn is_above_maximum(&self) -> bool {
        self.max_quantity.is_some_and(|max| self.total_quantity() > max)
    }

    pub fn batches(&self) -> &[StockBatch] {
        &self.batches
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Pure read: can `quantity` be reserved right now?
    pub fn check_availability(&self, quantity: Decimal) -> DomainResult<Availability> {
        let requested = Quantity::positive(quantity)?;
        Ok(Availability {
            sufficient: self.available >= requested,
            available: self.available,
        })
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl InventoryItem {
    fn ensure_tenant(&self, tenant_id: TenantId) -> DomainResult<()> {
        if self.tenant_id != tenant_id {
            return Err(DomainError::not_found(format!("inventory item {}", self.id)));
        }
        Ok(())
    }

    fn ensure_key(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> DomainResult<()> {
        self.ensure_tenant(tenant_id)?;
        if self.warehouse_id != warehouse_id || self.product_id != product_id {
            return Err(DomainError::invalid_input(
                "warehouse/product do not match the inventory item",
            ));
        }
        Ok(())
    }

    fn ensure_owns(&self, lock: &StockLock) -> DomainResult<()> {
        if lock.tenant_id() != self.tenant_id {
            return Err(DomainError::not_found(format!("stock lock {}", lock.id_typed())));
        }
        if lock.item_id() != self.id {
            return Err(DomainError::invalid_input(format!(
                "lock {} does not belong to inventory item {}",
                lock.id_typed(),
                self.id
            )));
        }
        Ok(())
    }

    /// Deterministic version tracking: +1 per accepted mutation.
    fn touch(&mut self, at: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = at;
    }

    /// Build a ledger entry after the mutation has been applied.
    #[allow(clippy::too_many_arguments)]
    fn entry(
        &self,
        kind: TransactionType,
        quantity: Quantity,
        signed_quantity: Decimal,
        unit_cost: Decimal,
        total_cost: Decimal,
        balance_before: Decimal,
        source: &SourceRef,
        at: DateTime<Utc>,
    ) -> InventoryTransaction {
        InventoryTransaction {
            id: TransactionId::generate(),
            tenant_id: self.tenant_id,
            item_id: self.id,
            warehouse_id: self.warehouse_id,
            product_id: self.product_id,
            transaction_type: kind,
            quantity,
            signed_quantity,
            unit_cost,
            total_cost,
            balance_before,
            balance_after: self.total_quantity().value(),
            source: source.clone(),
            reference: None,
            reason: None,
            lock_id: None,
            batch_id: None,
            cost_method: None,
            item_version: self.version,
            transaction_date: at,
        }
    }

    /// Emitted when the total drops from at-or-above the minimum to below it.
    fn crossed_minimum(
        &self,
        total_before: Quantity,
        at: DateTime<Utc>,
    ) -> Option<InventoryEvent> {
        let min = self.min_quantity?;
        if total_before >= min && self.total_quantity() < min {
            Some(InventoryEvent::StockBelowMinimum(StockBelowMinimum {
                tenant_id: self.tenant_id,
                item_id: self.id,
                warehouse_id: self.warehouse_id,
                product_id: self.product_id,
                total_quantity: self.total_quantity().value(),
                min_quantity: min.value(),
                occurred_at: at,
            }))
        } else {
            None
        }
    }

    pub fn increase_stock(&mut self, cmd: &IncreaseStock) -> DomainResult<StockChange> {
        self.ensure_key(cmd.tenant_id, cmd.warehouse_id, cmd.product_id)?;
        let quantity = Quantity::positive(cmd.quantity)?;
        let unit_cost = ensure_cost(cmd.unit_cost)?;

        let batch = match &cmd.batch {
            Some(info) => Some(self.new_batch(info, quantity, unit_cost, cmd.occurred_at)?),
            None => None,
        };

        let before = self.total_quantity();
        let after = before.checked_add(quantity)?;
        let available = self.available.checked_add(quantity)?;
        let total_cost = quantity.checked_value_at(unit_cost)?;
        let average_cost = if before.is_zero() {
            unit_cost
        } else {
            before
                .checked_value_at(self.unit_cost)?
                .checked_add(total_cost)
                .and_then(|value| value.checked_div(after.value()))
                .map(round_cost)
                .ok_or_else(|| {
                    DomainError::invalid_input("inventory value exceeds the decimal range")
                })?
        };

        self.unit_cost = average_cost;
        self.available = available;
        let batch_id = batch.as_ref().map(|b| b.id);
        if let Some(batch) = batch {
            self.batches.push(batch);
        }
        self.touch(cmd.occurred_at);

        let mut tx = self.entry(
            TransactionType::Inbound,
            quantity,
            quantity.value(),
            unit_cost,
            total_cost,
            before.value(),
            &cmd.source,
            cmd.occurred_at,
        );
        tx.reference = cmd.reference.clone();
        tx.batch_id = batch_id;

        let event = InventoryEvent::StockIncreased(StockIncreased {
            tenant_id: self.tenant_id,
            item_id: self.id,
            warehouse_id: self.warehouse_id,
            product_id: self.product_id,
            quantity,
            unit_cost,
            average_cost: self.unit_cost,
            total_after: after.value(),
            batch_id,
            occurred_at: cmd.occurred_at,
        });

        Ok(StockChange {
            transaction: tx,
            events: vec![event],
        })
    }

    fn new_batch(
        &self,
        info: &BatchInfo,
        quantity: Quantity,
        unit_cost: Decimal,
        at: DateTime<Utc>,
    ) -> DomainResult<StockBatch> {
        let batch_number = info
            .batch_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if let Some(number) = &batch_number {
            if self
                .batches
                .iter()
                .any(|b| b.batch_number.as_deref() == Some(number.as_str()))
            {
                return Err(DomainError::invalid_input(format!(
                    "batch number '{number}' already exists for this item"
                )));
            }
        }
        if let (Some(produced), Some(expires)) = (info.production_date, info.expiry_date) {
            if expires < produced {
                return Err(DomainError::invalid_input(
                    "batch expiry date is before its production date",
                ));
            }
        }
        Ok(StockBatch {
            id: StockBatchId::generate(),
            batch_number,
            production_date: info.production_date,
            expiry_date: info.expiry_date,
            received_quantity: quantity,
            remaining: quantity,
            unit_cost,
            received_at: at,
        })
    }

    /// Reserve `cmd.quantity` out of available stock.
    pub fn lock_stock(&mut self, cmd: &LockStock) -> DomainResult<(StockLock, StockChange)> {
        self.ensure_key(cmd.tenant_id, cmd.warehouse_id, cmd.product_id)?;
        let quantity = Quantity::positive(cmd.quantity)?;
        if let Some(expire_at) = cmd.expire_at {
            if expire_at <= cmd.occurred_at {
                return Err(DomainError::invalid_input("lock expiry must be in the future"));
            }
        }
        let available = self.available.checked_sub(quantity).ok_or_else(|| {
            DomainError::insufficient_stock(quantity.value(), self.available.value())
        })?;
        let locked = self.locked.checked_add(quantity)?;
        let total_cost = quantity.checked_value_at(self.unit_cost)?;

        let lock = StockLock::new(
            StockLockId::generate(),
            self.tenant_id,
            self.id,
            self.warehouse_id,
            self.product_id,
            quantity,
            cmd.source.clone(),
            cmd.expire_at,
            cmd.occurred_at,
        );

        let total = self.total_quantity();
        self.available = available;
        self.locked = locked;
        self.touch(cmd.occurred_at);

        let mut tx = self.entry(
            TransactionType::Lock,
            quantity,
            Decimal::ZERO,
            self.unit_cost,
            total_cost,
            total.value(),
            &cmd.source,
            cmd.occurred_at,
        );
        tx.lock_id = Some(lock.id_typed());

        let event = InventoryEvent::StockLocked(StockLocked {
            tenant_id: self.tenant_id,
            item_id: self.id,
            lock_id: lock.id_typed(),
            quantity,
            source: cmd.source.clone(),
            expire_at: cmd.expire_at,
            occurred_at: cmd.occurred_at,
        });

        Ok((
            lock,
            StockChange {
                transaction: tx,
                events: vec![event],
            },
        ))
    }

    /// Explicit release. Also accepted on an expired lock the sweep has not
    /// reached yet.
    pub fn unlock_stock(
        &mut self,
        lock: &mut StockLock,
        cmd: &UnlockStock,
    ) -> DomainResult<StockChange> {
        self.ensure_tenant(cmd.tenant_id)?;
        if lock.id_typed() != cmd.lock_id {
            return Err(DomainError::invalid_input("lock id does not match command"));
        }
        self.release_lock(lock, ReleaseCause::Unlock, cmd.reason.clone(), cmd.occurred_at)
    }

    /// Sweep release of a lock whose expiry has passed.
    pub fn release_expired(
        &mut self,
        lock: &mut StockLock,
        at: DateTime<Utc>,
    ) -> DomainResult<StockChange> {
        if !lock.is_expired_at(at) {
            return Err(DomainError::invalid_state(format!(
                "lock {} has not expired",
                lock.id_typed()
            )));
        }
        self.release_lock(lock, ReleaseCause::Expiry, Some("lock expired".to_string()), at)
    }

    fn release_lock(
        &mut self,
        lock: &mut StockLock,
        cause: ReleaseCause,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<StockChange> {
        self.ensure_owns(lock)?;
        lock.ensure_unresolved()?;
        let quantity = lock.quantity();
        let locked = self.locked.checked_sub(quantity).ok_or_else(|| {
            DomainError::invalid_state(format!(
                "locked quantity {} is smaller than lock {}",
                self.locked,
                lock.id_typed()
            ))
        })?;
        let available = self.available.checked_add(quantity)?;
        let total_cost = quantity.checked_value_at(self.unit_cost)?;

        lock.release(at)?;
        let total = self.total_quantity();
        self.locked = locked;
        self.available = available;
        self.touch(at);

        let mut tx = self.entry(
            TransactionType::Unlock,
            quantity,
            Decimal::ZERO,
            self.unit_cost,
            total_cost,
            total.value(),
            lock.source(),
            at,
        );
        tx.lock_id = Some(lock.id_typed());
        tx.reason = reason;

        let released = LockReleased {
            tenant_id: self.tenant_id,
            item_id: self.id,
            lock_id: lock.id_typed(),
            quantity,
            occurred_at: at,
        };
        let event = match cause {
            ReleaseCause::Unlock => InventoryEvent::StockUnlocked(released),
            ReleaseCause::Expiry => InventoryEvent::LockExpired(released),
        };

        Ok(StockChange {
            transaction: tx,
            events: vec![event],
        })
    }

    /// Consume a lock: the locked quantity physically leaves stock.
    pub fn deduct_stock(
        &mut self,
        lock: &mut StockLock,
        cmd: &DeductStock,
        batches: &dyn BatchStrategy,
        costing: &dyn CostStrategy,
    ) -> DomainResult<StockChange> {
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_owns(lock)?;
        if lock.id_typed() != cmd.lock_id {
            return Err(DomainError::invalid_input("lock id does not match command"));
        }
        lock.ensure_unresolved()?;
        if lock.is_expired_at(cmd.occurred_at) {
            return Err(DomainError::invalid_state(format!(
                "lock {} expired and can no longer be deducted",
                lock.id_typed()
            )));
        }
        let quantity = lock.quantity();
        let locked = self.locked.checked_sub(quantity).ok_or_else(|| {
            DomainError::invalid_state(format!(
                "locked quantity {} is smaller than lock {}",
                self.locked,
                lock.id_typed()
            ))
        })?;

        let candidates: Vec<_> = self.batches.iter().map(StockBatch::candidate).collect();
        let selection = batches.select(quantity, &candidates, cmd.occurred_at.date_naive())?;
        let unit_cost = costing.outbound_unit_cost(self.unit_cost, &selection)?;
        let total_cost = quantity.checked_value_at(unit_cost)?;

        lock.consume(cmd.occurred_at)?;
        let total = self.total_quantity();
        for draw in &selection.draws {
            if let Some(batch) = self
                .batches
                .iter_mut()
                .find(|b| b.id.as_aggregate_id() == draw.batch_id)
            {
                batch.remaining = draw.remaining_after;
            }
        }
        self.locked = locked;
        self.touch(cmd.occurred_at);

        let mut tx = self.entry(
            TransactionType::Outbound,
            quantity,
            -quantity.value(),
            unit_cost,
            total_cost,
            total.value(),
            &cmd.source,
            cmd.occurred_at,
        );
        tx.reference = cmd.reference.clone();
        tx.lock_id = Some(lock.id_typed());
        tx.batch_id = selection.single_batch().map(StockBatchId::new);
        tx.cost_method = Some(costing.name().to_string());

        let mut events = vec![InventoryEvent::StockDeducted(StockDeducted {
            tenant_id: self.tenant_id,
            item_id: self.id,
            lock_id: lock.id_typed(),
            quantity,
            unit_cost,
            total_cost: tx.total_cost,
            cost_method: costing.name().to_string(),
            batches: selection.draws,
            occurred_at: cmd.occurred_at,
        })];
        events.extend(self.crossed_minimum(total, cmd.occurred_at));

        Ok(StockChange {
            transaction: tx,
            events,
        })
    }

    /// Set the total to a counted quantity. `Ok(None)` when nothing changes.
    pub fn adjust_stock(&mut self, cmd: &AdjustStock) -> DomainResult<Option<StockChange>> {
        self.ensure_key(cmd.tenant_id, cmd.warehouse_id, cmd.product_id)?;
        let actual = Quantity::new(cmd.actual_quantity)?;
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::invalid_input("adjustment reason cannot be empty"));
        }
        let available = actual.checked_sub(self.locked).ok_or_else(|| {
            DomainError::invalid_state(format!(
                "cannot adjust to {actual}: {} is locked",
                self.locked
            ))
        })?;

        let before = self.total_quantity();
        let difference = actual.value() - before.value();
        if difference.is_zero() {
            return Ok(None);
        }

        let magnitude = Quantity::new(difference.abs())?;
        let total_cost = magnitude.checked_value_at(self.unit_cost)?;

        self.available = available;
        self.touch(cmd.occurred_at);

        let mut tx = self.entry(
            TransactionType::Adjustment,
            magnitude,
            difference,
            self.unit_cost,
            total_cost,
            before.value(),
            &cmd.source,
            cmd.occurred_at,
        );
        tx.reason = Some(cmd.reason.clone());

        let mut events = vec![InventoryEvent::StockAdjusted(StockAdjusted {
            tenant_id: self.tenant_id,
            item_id: self.id,
            total_before: before.value(),
            total_after: actual.value(),
            difference,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })];
        events.extend(self.crossed_minimum(before, cmd.occurred_at));

        Ok(Some(StockChange {
            transaction: tx,
            events,
        }))
    }

    /// Versioned, but not quantity-affecting: no ledger entry.
    pub fn set_thresholds(&mut self, cmd: &SetThresholds) -> DomainResult<()> {
        self.ensure_key(cmd.tenant_id, cmd.warehouse_id, cmd.product_id)?;
        let min = cmd.min_quantity.map(Quantity::new).transpose()?;
        let max = cmd.max_quantity.map(Quantity::new).transpose()?;
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(DomainError::invalid_input(format!(
                    "min quantity {min} exceeds max quantity {max}"
                )));
            }
        }
        self.min_quantity = min;
        self.max_quantity = max;
        self.touch(cmd.occurred_at);
        Ok(())
    }
}
