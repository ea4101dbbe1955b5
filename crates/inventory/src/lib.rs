//! Inventory domain: stock ledger, reservations and stock taking.
//!
//! This crate contains business rules for inventory, implemented purely as
//! deterministic domain logic (no IO, no storage). Aggregates return the
//! ledger entries and events a mutation produced; persisting them atomically
//! is the caller's job.

pub mod batch;
pub mod events;
pub mod ids;
pub mod item;
pub mod lock;
pub mod stock_taking;
pub mod transaction;

pub use batch::{BatchInfo, StockBatch};
pub use events::{
    InventoryEvent, LockReleased, StockAdjusted, StockBelowMinimum, StockDeducted,
    StockIncreased, StockLocked, StockTakingEvent,
};
pub use ids::{InventoryItemId, StockBatchId, StockLockId, StockTakingId, TransactionId};
pub use item::{
    AdjustStock, Availability, DeductStock, IncreaseStock, InventoryItem, LockStock,
    ReleaseCause, SetThresholds, StockChange, UnlockStock,
};
pub use lock::{LockStatus, StockLock};
pub use stock_taking::{
    CountEntry, NewStockTakingItem, StockAdjustmentRequest, StockTaking, StockTakingItem,
    StockTakingProgress, StockTakingStatus, format_taking_number,
};
pub use transaction::{
    InventoryTransaction, SourceRef, TransactionFilter, TransactionType, rebuild_total,
    verify_continuity,
};
