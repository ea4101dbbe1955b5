//! Typed identifiers for inventory entities.

use serde::{Deserialize, Serialize};

use stockledger_core::AggregateId;

macro_rules! aggregate_newtype {
    ($(#[$meta:meta])* $t:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(pub AggregateId);

        impl $t {
            pub fn new(id: AggregateId) -> Self {
                Self(id)
            }

            /// Fresh time-ordered identifier.
            pub fn generate() -> Self {
                Self(AggregateId::new())
            }

            pub fn as_aggregate_id(&self) -> AggregateId {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

aggregate_newtype!(
    /// Inventory item identifier. The natural key is (tenant, warehouse, product).
    InventoryItemId
);
aggregate_newtype!(StockLockId);
aggregate_newtype!(TransactionId);
aggregate_newtype!(StockBatchId);
aggregate_newtype!(StockTakingId);
