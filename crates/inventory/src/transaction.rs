//! Append-only inventory ledger entries.
//!
//! Every quantity-affecting operation writes exactly one entry in the same
//! unit of work as the item mutation. Balances refer to the item's total
//! quantity (available + locked), so LOCK/UNLOCK entries carry a zero signed
//! delta and equal before/after balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    DomainError, DomainResult, Entity, ProductId, Quantity, TenantId, ValueObject, WarehouseId,
};

use crate::ids::{InventoryItemId, StockBatchId, StockLockId, TransactionId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Inbound,
    Outbound,
    Lock,
    Unlock,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Inbound => "INBOUND",
            TransactionType::Outbound => "OUTBOUND",
            TransactionType::Lock => "LOCK",
            TransactionType::Unlock => "UNLOCK",
            TransactionType::Adjustment => "ADJUSTMENT",
        }
    }

    /// Whether entries of this type may change the total quantity.
    pub fn moves_total(self) -> bool {
        matches!(
            self,
            TransactionType::Inbound | TransactionType::Outbound | TransactionType::Adjustment
        )
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-defined correlation, e.g. `("sales_order", "SO-001")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    source_type: String,
    source_id: String,
}

impl SourceRef {
    pub fn new(source_type: impl Into<String>, source_id: impl Into<String>) -> DomainResult<Self> {
        let source_type = source_type.into();
        let source_id = source_id.into();
        if source_type.trim().is_empty() {
            return Err(DomainError::invalid_input("source type cannot be empty"));
        }
        if source_id.trim().is_empty() {
            return Err(DomainError::invalid_input("source id cannot be empty"));
        }
        Ok(Self {
            source_type,
            source_id,
        })
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

impl ValueObject for SourceRef {}

impl core::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.source_type, self.source_id)
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: TransactionId,
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub transaction_type: TransactionType,
    /// Unsigned magnitude of the movement.
    pub quantity: Quantity,
    /// Delta applied to the item's total quantity.
    pub signed_quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub source: SourceRef,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub lock_id: Option<StockLockId>,
    pub batch_id: Option<StockBatchId>,
    /// Name of the cost strategy that valued an outbound entry.
    pub cost_method: Option<String>,
    /// Item version reached by the mutation that wrote this entry.
    pub item_version: u64,
    pub transaction_date: DateTime<Utc>,
}

impl Entity for InventoryTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Ledger read-model filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub item_id: Option<InventoryItemId>,
    pub warehouse_id: Option<WarehouseId>,
    pub product_id: Option<ProductId>,
    pub transaction_type: Option<TransactionType>,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn for_item(item_id: InventoryItemId) -> Self {
        Self {
            item_id: Some(item_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, tx: &InventoryTransaction) -> bool {
        self.item_id.is_none_or(|id| tx.item_id == id)
            && self.warehouse_id.is_none_or(|id| tx.warehouse_id == id)
            && self.product_id.is_none_or(|id| tx.product_id == id)
            && self.transaction_type.is_none_or(|t| tx.transaction_type == t)
            && self
                .source_type
                .as_deref()
                .is_none_or(|s| tx.source.source_type() == s)
            && self
                .source_id
                .as_deref()
                .is_none_or(|s| tx.source.source_id() == s)
            && self.from.is_none_or(|from| tx.transaction_date >= from)
            && self.to.is_none_or(|to| tx.transaction_date < to)
    }
}

/// Check that one item's entries, in ledger order, chain balance to balance
/// and that LOCK/UNLOCK entries never move the total.
pub fn verify_continuity(entries: &[InventoryTransaction]) -> DomainResult<()> {
    for tx in entries {
        if tx.balance_before.checked_add(tx.signed_quantity) != Some(tx.balance_after) {
            return Err(DomainError::invalid_state(format!(
                "transaction {} does not balance: {} + {} != {}",
                tx.id, tx.balance_before, tx.signed_quantity, tx.balance_after
            )));
        }
        if !tx.transaction_type.moves_total() && !tx.signed_quantity.is_zero() {
            return Err(DomainError::invalid_state(format!(
                "{} transaction {} changed the total quantity",
                tx.transaction_type, tx.id
            )));
        }
    }
    for pair in entries.windows(2) {
        if pair[0].balance_after != pair[1].balance_before {
            return Err(DomainError::invalid_state(format!(
                "ledger gap between {} (after {}) and {} (before {})",
                pair[0].id, pair[0].balance_after, pair[1].id, pair[1].balance_before
            )));
        }
    }
    Ok(())
}

/// Replay an item's entries from zero and return the resulting total.
pub fn rebuild_total(entries: &[InventoryTransaction]) -> DomainResult<Decimal> {
    entries.iter().try_fold(Decimal::ZERO, |total, tx| {
        total.checked_add(tx.signed_quantity).ok_or_else(|| {
            DomainError::invalid_state(format!(
                "ledger replay overflows at transaction {}",
                tx.id
            ))
        })
    })
}
