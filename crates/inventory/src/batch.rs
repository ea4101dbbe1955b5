//! Stock batches (lots) tracked within an inventory item.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, Quantity};
use stockledger_strategy::BatchCandidate;

use crate::ids::StockBatchId;

/// Lot details supplied with an inbound movement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInfo {
    pub batch_number: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBatch {
    pub id: StockBatchId,
    /// Unique within the owning item when set.
    pub batch_number: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub received_quantity: Quantity,
    pub remaining: Quantity,
    pub unit_cost: Decimal,
    pub received_at: DateTime<Utc>,
}

impl StockBatch {
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|d| d < today)
    }

    pub(crate) fn candidate(&self) -> BatchCandidate {
        BatchCandidate {
            batch_id: self.id.as_aggregate_id(),
            batch_number: self.batch_number.clone(),
            remaining: self.remaining,
            unit_cost: self.unit_cost,
            production_date: self.production_date,
            expiry_date: self.expiry_date,
            received_at: self.received_at,
        }
    }
}

impl Entity for StockBatch {
    type Id = StockBatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
