//! Domain events published after a successful commit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, Quantity, TenantId, UserId, WarehouseId};
use stockledger_events::Event;
use stockledger_strategy::BatchDraw;

use crate::ids::{InventoryItemId, StockBatchId, StockLockId, StockTakingId};
use crate::transaction::SourceRef;

/// Event: StockIncreased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIncreased {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit_cost: Decimal,
    /// Item unit cost after re-averaging.
    pub average_cost: Decimal,
    pub total_after: Decimal,
    pub batch_id: Option<StockBatchId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockLocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLocked {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub lock_id: StockLockId,
    pub quantity: Quantity,
    pub source: SourceRef,
    pub expire_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockUnlocked (explicit release) and LockExpired (sweep release).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockReleased {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub lock_id: StockLockId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockDeducted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDeducted {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub lock_id: StockLockId,
    pub quantity: Quantity,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub cost_method: String,
    pub batches: Vec<BatchDraw>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub total_before: Decimal,
    pub total_after: Decimal,
    pub difference: Decimal,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockBelowMinimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBelowMinimum {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub total_quantity: Decimal,
    pub min_quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    StockIncreased(StockIncreased),
    StockLocked(StockLocked),
    StockUnlocked(LockReleased),
    LockExpired(LockReleased),
    StockDeducted(StockDeducted),
    StockAdjusted(StockAdjusted),
    StockBelowMinimum(StockBelowMinimum),
}

impl InventoryEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            InventoryEvent::StockIncreased(e) => e.tenant_id,
            InventoryEvent::StockLocked(e) => e.tenant_id,
            InventoryEvent::StockUnlocked(e) | InventoryEvent::LockExpired(e) => e.tenant_id,
            InventoryEvent::StockDeducted(e) => e.tenant_id,
            InventoryEvent::StockAdjusted(e) => e.tenant_id,
            InventoryEvent::StockBelowMinimum(e) => e.tenant_id,
        }
    }

    pub fn item_id(&self) -> InventoryItemId {
        match self {
            InventoryEvent::StockIncreased(e) => e.item_id,
            InventoryEvent::StockLocked(e) => e.item_id,
            InventoryEvent::StockUnlocked(e) | InventoryEvent::LockExpired(e) => e.item_id,
            InventoryEvent::StockDeducted(e) => e.item_id,
            InventoryEvent::StockAdjusted(e) => e.item_id,
            InventoryEvent::StockBelowMinimum(e) => e.item_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockIncreased(_) => "inventory.stock.increased",
            InventoryEvent::StockLocked(_) => "inventory.stock.locked",
            InventoryEvent::StockUnlocked(_) => "inventory.stock.unlocked",
            InventoryEvent::LockExpired(_) => "inventory.lock.expired",
            InventoryEvent::StockDeducted(_) => "inventory.stock.deducted",
            InventoryEvent::StockAdjusted(_) => "inventory.stock.adjusted",
            InventoryEvent::StockBelowMinimum(_) => "inventory.stock.below_minimum",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::StockIncreased(e) => e.occurred_at,
            InventoryEvent::StockLocked(e) => e.occurred_at,
            InventoryEvent::StockUnlocked(e) | InventoryEvent::LockExpired(e) => e.occurred_at,
            InventoryEvent::StockDeducted(e) => e.occurred_at,
            InventoryEvent::StockAdjusted(e) => e.occurred_at,
            InventoryEvent::StockBelowMinimum(e) => e.occurred_at,
        }
    }
}

/// Stock-taking lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockTakingEvent {
    Created {
        tenant_id: TenantId,
        taking_id: StockTakingId,
        taking_number: String,
        warehouse_id: WarehouseId,
        created_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    CountingStarted {
        tenant_id: TenantId,
        taking_id: StockTakingId,
        total_items: usize,
        occurred_at: DateTime<Utc>,
    },
    SubmittedForApproval {
        tenant_id: TenantId,
        taking_id: StockTakingId,
        difference_items: usize,
        total_difference: Decimal,
        occurred_at: DateTime<Utc>,
    },
    Approved {
        tenant_id: TenantId,
        taking_id: StockTakingId,
        approved_by: UserId,
        adjusted_items: usize,
        occurred_at: DateTime<Utc>,
    },
    Rejected {
        tenant_id: TenantId,
        taking_id: StockTakingId,
        rejected_by: UserId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    Cancelled {
        tenant_id: TenantId,
        taking_id: StockTakingId,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    },
}

impl StockTakingEvent {
    pub fn taking_id(&self) -> StockTakingId {
        match self {
            StockTakingEvent::Created { taking_id, .. }
            | StockTakingEvent::CountingStarted { taking_id, .. }
            | StockTakingEvent::SubmittedForApproval { taking_id, .. }
            | StockTakingEvent::Approved { taking_id, .. }
            | StockTakingEvent::Rejected { taking_id, .. }
            | StockTakingEvent::Cancelled { taking_id, .. } => *taking_id,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            StockTakingEvent::Created { tenant_id, .. }
            | StockTakingEvent::CountingStarted { tenant_id, .. }
            | StockTakingEvent::SubmittedForApproval { tenant_id, .. }
            | StockTakingEvent::Approved { tenant_id, .. }
            | StockTakingEvent::Rejected { tenant_id, .. }
            | StockTakingEvent::Cancelled { tenant_id, .. } => *tenant_id,
        }
    }
}

impl Event for StockTakingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockTakingEvent::Created { .. } => "inventory.stock_taking.created",
            StockTakingEvent::CountingStarted { .. } => "inventory.stock_taking.counting_started",
            StockTakingEvent::SubmittedForApproval { .. } => "inventory.stock_taking.submitted",
            StockTakingEvent::Approved { .. } => "inventory.stock_taking.approved",
            StockTakingEvent::Rejected { .. } => "inventory.stock_taking.rejected",
            StockTakingEvent::Cancelled { .. } => "inventory.stock_taking.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockTakingEvent::Created { occurred_at, .. }
            | StockTakingEvent::CountingStarted { occurred_at, .. }
            | StockTakingEvent::SubmittedForApproval { occurred_at, .. }
            | StockTakingEvent::Approved { occurred_at, .. }
            | StockTakingEvent::Rejected { occurred_at, .. }
            | StockTakingEvent::Cancelled { occurred_at, .. } => *occurred_at,
        }
    }
}
