//! Stock locks (reservations).
//!
//! A lock holds quantity out of the available pool until it is resolved
//! exactly once: released (cancellation or expiry) or consumed (fulfillment).
//! Once resolved it never changes again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    DomainError, DomainResult, Entity, ProductId, Quantity, TenantId, WarehouseId,
};

use crate::ids::{InventoryItemId, StockLockId};
use crate::transaction::SourceRef;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Active,
    /// Past `expire_at` but not yet swept or resolved.
    Expired,
    Released,
    Consumed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLock {
    id: StockLockId,
    tenant_id: TenantId,
    item_id: InventoryItemId,
    warehouse_id: WarehouseId,
    product_id: ProductId,
    quantity: Quantity,
    source: SourceRef,
    expire_at: Option<DateTime<Utc>>,
    released: bool,
    consumed: bool,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl StockLock {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: StockLockId,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: Quantity,
        source: SourceRef,
        expire_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            item_id,
            warehouse_id,
            product_id,
            quantity,
            source,
            expire_at,
            released: false,
            consumed: false,
            created_at,
            resolved_at: None,
        }
    }

    pub fn id_typed(&self) -> StockLockId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn item_id(&self) -> InventoryItemId {
        self.item_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        self.expire_at
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn is_terminal(&self) -> bool {
        self.released || self.consumed
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|at| at < now)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_terminal() && !self.is_expired_at(now)
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> LockStatus {
        if self.consumed {
            LockStatus::Consumed
        } else if self.released {
            LockStatus::Released
        } else if self.is_expired_at(now) {
            LockStatus::Expired
        } else {
            LockStatus::Active
        }
    }

    pub(crate) fn ensure_unresolved(&self) -> DomainResult<()> {
        if self.consumed {
            return Err(DomainError::invalid_state(format!(
                "lock {} already consumed",
                self.id
            )));
        }
        if self.released {
            return Err(DomainError::invalid_state(format!(
                "lock {} already released",
                self.id
            )));
        }
        Ok(())
    }

    /// Release path (unlock or expiry sweep). Allowed on expired locks.
    pub(crate) fn release(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_unresolved()?;
        self.released = true;
        self.resolved_at = Some(at);
        Ok(())
    }

    /// Fulfillment path. An expired lock can no longer be consumed.
    pub(crate) fn consume(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_unresolved()?;
        if self.is_expired_at(at) {
            return Err(DomainError::invalid_state(format!(
                "lock {} expired and can no longer be deducted",
                self.id
            )));
        }
        self.consumed = true;
        self.resolved_at = Some(at);
        Ok(())
    }
}

impl Entity for StockLock {
    type Id = StockLockId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
