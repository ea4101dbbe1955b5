//! Application services: load, decide, commit, publish.
//!
//! ```text
//! command
//!   ↓
//! 1. load aggregate(s) from the store (tenant-scoped)
//!   ↓
//! 2. decide in the pure domain (new state + ledger entry + events)
//!   ↓
//! 3. commit one UnitOfWork against the loaded versions
//!   ↓
//! 4. publish events, only after the commit succeeded
//! ```
//!
//! Nothing is retried here. A `CONCURRENCY_CONFLICT` goes back to the caller,
//! who re-reads and decides again.

pub mod inventory;
pub mod stock_taking;

pub use inventory::{InventoryService, SweepReport};
pub use stock_taking::{CreateStockTaking, StockTakingProduct, StockTakingService};

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockledger_core::{AggregateId, DomainError, ErrorKind, TenantId};
use stockledger_events::{Event, EventBus, EventEnvelope};

use crate::store::StoreError;

pub const ITEM_AGGREGATE: &str = "inventory.item";
pub const STOCK_TAKING_AGGREGATE: &str = "inventory.stock_taking";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage failure with no domain meaning (backend down, isolation bug).
    #[error(transparent)]
    Store(StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => DomainError::conflict(msg).into(),
            StoreError::Duplicate(msg) => DomainError::invalid_input(format!("duplicate {msg}")).into(),
            StoreError::LockResolved(id) => {
                DomainError::invalid_state(format!("lock {id} already resolved")).into()
            }
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ServiceError::Domain(e) => Some(e.kind()),
            ServiceError::Store(_) => None,
        }
    }

    /// Stable machine-readable code; `STORE_FAILURE` for backend errors.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Domain(e) => e.code(),
            ServiceError::Store(_) => "STORE_FAILURE",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Domain(e) if e.is_retryable())
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }
}

/// Publish committed events as JSON envelopes. Failures are logged, never
/// returned: the commit already happened and is the source of truth.
pub(crate) fn publish<B, E>(
    bus: &B,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: &str,
    aggregate_version: u64,
    events: Vec<E>,
) where
    B: EventBus<EventEnvelope<JsonValue>>,
    E: Event + Serialize,
{
    for event in events {
        let envelope =
            EventEnvelope::wrap(tenant_id, aggregate_id, aggregate_type, aggregate_version, event);
        let event_type = envelope.event_type().to_string();
        let encoded = match envelope.try_map_payload(|e| serde_json::to_value(&e)) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(%event_type, error = %e, "failed to encode event; dropped");
                continue;
            }
        };
        if let Err(e) = bus.publish(encoded) {
            tracing::warn!(%event_type, error = %e, "event publication failed after commit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_inventory::StockLockId;

    #[test]
    fn store_errors_fold_into_domain_kinds() {
        let conflict: ServiceError = StoreError::Concurrency("v1 != v2".into()).into();
        assert_eq!(conflict.code(), "CONCURRENCY_CONFLICT");
        assert!(conflict.is_retryable());

        let dup: ServiceError = StoreError::Duplicate("stock taking number ST-1".into()).into();
        assert_eq!(dup.code(), "INVALID_INPUT");

        let resolved: ServiceError = StoreError::LockResolved(StockLockId::generate()).into();
        assert_eq!(resolved.kind(), Some(ErrorKind::InvalidState));

        let backend: ServiceError = StoreError::Backend("disk full".into()).into();
        assert_eq!(backend.code(), "STORE_FAILURE");
        assert!(!backend.is_retryable());
        assert!(backend.as_domain().is_none());
    }
}
