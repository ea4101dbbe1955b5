//! Payment allocation: how an incoming amount settles open documents.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult};

use crate::strategy::{Strategy, StrategyFamily};

/// An open document (invoice, receivable, payable) that can absorb payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub target_id: String,
    pub document_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub outstanding: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub target_id: String,
    pub amount: Decimal,
    pub fully_settled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub allocations: Vec<Allocation>,
    pub allocated: Decimal,
    pub unallocated: Decimal,
}

pub trait AllocationStrategy: Strategy {
    /// Sort targets so the one to settle first comes first.
    fn order(&self, targets: &mut [AllocationTarget]);

    fn allocate(
        &self,
        amount: Decimal,
        targets: &[AllocationTarget],
    ) -> DomainResult<AllocationResult> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::invalid_input(format!(
                "allocation amount must be > 0, got {amount}"
            )));
        }

        let mut open: Vec<AllocationTarget> = targets
            .iter()
            .filter(|t| t.outstanding > Decimal::ZERO)
            .cloned()
            .collect();
        self.order(&mut open);

        let mut left = amount;
        let mut allocations = Vec::new();
        for target in open {
            if left.is_zero() {
                break;
            }
            let paid = left.min(target.outstanding);
            allocations.push(Allocation {
                fully_settled: paid == target.outstanding,
                target_id: target.target_id,
                amount: paid,
            });
            left -= paid;
        }

        Ok(AllocationResult {
            allocations,
            allocated: amount - left,
            unallocated: left,
        })
    }
}

/// Oldest document first.
#[derive(Debug, Default, Clone, Copy)]
pub struct FifoAllocation;

impl FifoAllocation {
    pub const NAME: &'static str = "fifo";
}

impl Strategy for FifoAllocation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Allocation
    }

    fn description(&self) -> &str {
        "First in, first out: settles the oldest documents first by document date"
    }
}

impl AllocationStrategy for FifoAllocation {
    fn order(&self, targets: &mut [AllocationTarget]) {
        targets.sort_by(|a, b| a.document_date.cmp(&b.document_date));
    }
}

/// Earliest due date first; documents without a due date go last.
#[derive(Debug, Default, Clone, Copy)]
pub struct DueDateAllocation;

impl DueDateAllocation {
    pub const NAME: &'static str = "due_date";
}

impl Strategy for DueDateAllocation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Allocation
    }

    fn description(&self) -> &str {
        "Due date: settles documents closest to their due date first"
    }
}

impl AllocationStrategy for DueDateAllocation {
    fn order(&self, targets: &mut [AllocationTarget]) {
        targets.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y).then(a.document_date.cmp(&b.document_date)),
            (Some(_), None) => core::cmp::Ordering::Less,
            (None, Some(_)) => core::cmp::Ordering::Greater,
            (None, None) => a.document_date.cmp(&b.document_date),
        });
    }
}
