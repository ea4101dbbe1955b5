//! Outbound valuation.

use rust_decimal::Decimal;

use stockledger_core::{DomainError, DomainResult, round_cost};

use crate::batch::BatchSelection;
use crate::strategy::{Strategy, StrategyFamily};

/// How an outbound movement is valued.
///
/// The item's running unit cost is always the weighted average of inbound
/// receipts; a cost strategy only decides what an outbound movement is worth.
pub trait CostStrategy: Strategy {
    /// Unit cost for an outbound movement of `selection.requested`.
    fn outbound_unit_cost(
        &self,
        item_unit_cost: Decimal,
        selection: &BatchSelection,
    ) -> DomainResult<Decimal>;
}

/// Values outbound stock at the item's current weighted-average cost.
#[derive(Debug, Default, Clone, Copy)]
pub struct MovingAverageCost;

impl MovingAverageCost {
    pub const NAME: &'static str = "moving_average";
}

impl Strategy for MovingAverageCost {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Cost
    }

    fn description(&self) -> &str {
        "Moving weighted average: outbound stock is valued at the item's current average unit cost"
    }
}

impl CostStrategy for MovingAverageCost {
    fn outbound_unit_cost(
        &self,
        item_unit_cost: Decimal,
        _selection: &BatchSelection,
    ) -> DomainResult<Decimal> {
        Ok(item_unit_cost)
    }
}

/// Values outbound stock at the cost of the batches actually drawn.
///
/// Quantity no batch covered is valued at the item's average cost.
#[derive(Debug, Default, Clone, Copy)]
pub struct FifoCost;

impl FifoCost {
    pub const NAME: &'static str = "fifo";
}

impl Strategy for FifoCost {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Cost
    }

    fn description(&self) -> &str {
        "First in, first out: outbound stock is valued at the cost of the batches it was drawn from"
    }
}

impl CostStrategy for FifoCost {
    fn outbound_unit_cost(
        &self,
        item_unit_cost: Decimal,
        selection: &BatchSelection,
    ) -> DomainResult<Decimal> {
        if selection.drawn.is_zero() || selection.requested.is_zero() {
            return Ok(item_unit_cost);
        }
        let uncovered_cost = selection.uncovered.checked_value_at(item_unit_cost)?;
        selection
            .total_cost
            .checked_add(uncovered_cost)
            .and_then(|total| total.checked_div(selection.requested.value()))
            .map(round_cost)
            .ok_or_else(|| DomainError::invalid_input("outbound cost exceeds the decimal range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockledger_core::{AggregateId, Quantity};

    use crate::batch::BatchDraw;

    fn q(v: Decimal) -> Quantity {
        Quantity::new(v).unwrap()
    }

    fn selection(draws: &[(Decimal, Decimal)], requested: Decimal) -> BatchSelection {
        let mut s = BatchSelection::empty(q(requested));
        for (qty, cost) in draws {
            s.draws.push(BatchDraw {
                batch_id: AggregateId::new(),
                batch_number: None,
                quantity: q(*qty),
                unit_cost: *cost,
                total_cost: qty * cost,
                remaining_after: Quantity::ZERO,
            });
            s.drawn = s.drawn.checked_add(q(*qty)).unwrap();
            s.total_cost += qty * cost;
        }
        s.uncovered = q(requested).saturating_sub(s.drawn);
        s
    }

    #[test]
    fn moving_average_ignores_batches() {
        let s = selection(&[(dec!(10), dec!(99))], dec!(10));
        assert_eq!(MovingAverageCost.outbound_unit_cost(dec!(12.5), &s).unwrap(), dec!(12.5));
    }

    #[test]
    fn fifo_uses_drawn_batch_costs() {
        let s = selection(&[(dec!(100), dec!(10)), (dec!(50), dec!(20))], dec!(150));
        assert_eq!(FifoCost.outbound_unit_cost(dec!(15), &s).unwrap(), dec!(13.3333));
    }

    #[test]
    fn fifo_values_uncovered_quantity_at_item_cost() {
        let s = selection(&[(dec!(10), dec!(10))], dec!(20));
        assert_eq!(FifoCost.outbound_unit_cost(dec!(20), &s).unwrap(), dec!(15));
    }

    #[test]
    fn fifo_falls_back_without_batches() {
        let s = selection(&[], dec!(5));
        assert_eq!(FifoCost.outbound_unit_cost(dec!(7.25), &s).unwrap(), dec!(7.25));
    }

    #[test]
    fn fifo_rejects_uncovered_value_out_of_range() {
        let s = selection(&[(dec!(1), dec!(1))], dec!(100000000000000000000));
        let err = FifoCost.outbound_unit_cost(dec!(10000000000), &s).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }
}
