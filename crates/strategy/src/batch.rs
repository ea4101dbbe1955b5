//! Lot selection: which batches an outbound movement draws down first.

use core::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateId, DomainError, DomainResult, Quantity, round_cost};

use crate::strategy::{Strategy, StrategyFamily};

/// A batch as seen by a selection strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCandidate {
    pub batch_id: AggregateId,
    pub batch_number: Option<String>,
    pub remaining: Quantity,
    pub unit_cost: Decimal,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub received_at: DateTime<Utc>,
}

impl BatchCandidate {
    /// Has stock left and is not past its expiry date on `today`.
    pub fn is_available_on(&self, today: NaiveDate) -> bool {
        !self.remaining.is_zero() && self.expiry_date.is_none_or(|d| d >= today)
    }
}

/// Quantity drawn from one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDraw {
    pub batch_id: AggregateId,
    pub batch_number: Option<String>,
    pub quantity: Quantity,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub remaining_after: Quantity,
}

impl BatchDraw {
    pub fn fully_consumed(&self) -> bool {
        self.remaining_after.is_zero()
    }
}

/// Outcome of a selection: ordered draws plus whatever no batch could cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSelection {
    pub requested: Quantity,
    pub draws: Vec<BatchDraw>,
    pub drawn: Quantity,
    pub total_cost: Decimal,
    pub uncovered: Quantity,
}

impl BatchSelection {
    /// Nothing drawn; the whole request is untracked stock.
    pub fn empty(requested: Quantity) -> Self {
        Self {
            requested,
            draws: Vec::new(),
            drawn: Quantity::ZERO,
            total_cost: Decimal::ZERO,
            uncovered: requested,
        }
    }

    pub fn is_fully_covered(&self) -> bool {
        self.uncovered.is_zero()
    }

    /// Weighted unit cost of the drawn quantity, if anything was drawn.
    pub fn weighted_unit_cost(&self) -> Option<Decimal> {
        if self.drawn.is_zero() {
            return None;
        }
        self.total_cost.checked_div(self.drawn.value()).map(round_cost)
    }

    /// The batch id when exactly one batch was drawn.
    pub fn single_batch(&self) -> Option<AggregateId> {
        match self.draws.as_slice() {
            [only] => Some(only.batch_id),
            _ => None,
        }
    }
}

/// Lot-selection strategy.
///
/// Implementations only define an order; the draw-down itself is shared.
pub trait BatchStrategy: Strategy {
    /// Sort candidates so the batch to draw first comes first.
    fn order(&self, candidates: &mut [BatchCandidate]);

    /// Draw `requested` out of the available candidates in strategy order.
    fn select(
        &self,
        requested: Quantity,
        candidates: &[BatchCandidate],
        today: NaiveDate,
    ) -> DomainResult<BatchSelection> {
        let mut available: Vec<BatchCandidate> = candidates
            .iter()
            .filter(|c| c.is_available_on(today))
            .cloned()
            .collect();
        self.order(&mut available);
        draw_down(requested, &available)
    }
}

fn draw_down(requested: Quantity, ordered: &[BatchCandidate]) -> DomainResult<BatchSelection> {
    let mut selection = BatchSelection::empty(requested);
    let mut left = requested;

    for batch in ordered {
        if left.is_zero() {
            break;
        }
        let take = left.min(batch.remaining);
        if take.is_zero() {
            continue;
        }
        let cost = take.checked_value_at(batch.unit_cost)?;
        selection.draws.push(BatchDraw {
            batch_id: batch.batch_id,
            batch_number: batch.batch_number.clone(),
            quantity: take,
            unit_cost: batch.unit_cost,
            total_cost: cost,
            remaining_after: batch.remaining.saturating_sub(take),
        });
        selection.drawn = selection.drawn.checked_add(take)?;
        selection.total_cost = selection.total_cost.checked_add(cost).ok_or_else(|| {
            DomainError::invalid_input("cost of the drawn batches exceeds the decimal range")
        })?;
        left = left.saturating_sub(take);
    }

    selection.uncovered = left;
    Ok(selection)
}

/// Dated entries sort before undated ones.
fn dated_first(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Oldest first: production date, then receipt time.
#[derive(Debug, Default, Clone, Copy)]
pub struct FifoBatchStrategy;

impl FifoBatchStrategy {
    pub const NAME: &'static str = "fifo";
}

impl Strategy for FifoBatchStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Batch
    }

    fn description(&self) -> &str {
        "First in, first out: draws the oldest batches first by production date, then receipt time"
    }
}

impl BatchStrategy for FifoBatchStrategy {
    fn order(&self, candidates: &mut [BatchCandidate]) {
        candidates.sort_by(|a, b| {
            dated_first(a.production_date, b.production_date)
                .then_with(|| a.received_at.cmp(&b.received_at))
        });
    }
}

/// Soonest expiry first, then FIFO.
#[derive(Debug, Default, Clone, Copy)]
pub struct FefoBatchStrategy;

impl FefoBatchStrategy {
    pub const NAME: &'static str = "fefo";
}

impl Strategy for FefoBatchStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Batch
    }

    fn description(&self) -> &str {
        "First expired, first out: draws batches closest to expiry first"
    }
}

impl BatchStrategy for FefoBatchStrategy {
    fn order(&self, candidates: &mut [BatchCandidate]) {
        candidates.sort_by(|a, b| {
            dated_first(a.expiry_date, b.expiry_date)
                .then_with(|| dated_first(a.production_date, b.production_date))
                .then_with(|| a.received_at.cmp(&b.received_at))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use stockledger_core::checked_sum;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn candidate(
        qty: Decimal,
        cost: Decimal,
        production: Option<NaiveDate>,
        expiry: Option<NaiveDate>,
        received_offset_days: i64,
    ) -> BatchCandidate {
        BatchCandidate {
            batch_id: AggregateId::new(),
            batch_number: None,
            remaining: Quantity::new(qty).unwrap(),
            unit_cost: cost,
            production_date: production,
            expiry_date: expiry,
            received_at: t0() + Duration::days(received_offset_days),
        }
    }

    fn qty(v: Decimal) -> Quantity {
        Quantity::positive(v).unwrap()
    }

    #[test]
    fn fifo_draws_oldest_production_first() {
        let newer = candidate(dec!(50), dec!(12), Some(day(2024, 3, 1)), None, 0);
        let older = candidate(dec!(50), dec!(10), Some(day(2024, 2, 1)), None, 5);
        let undated = candidate(dec!(50), dec!(9), None, None, -10);

        let selection = FifoBatchStrategy.select(
            qty(dec!(80)),
            &[newer.clone(), undated.clone(), older.clone()],
            day(2024, 4, 1),
        )
        .unwrap();

        let order: Vec<_> = selection.draws.iter().map(|d| d.batch_id).collect();
        assert_eq!(order, vec![older.batch_id, newer.batch_id]);
        assert_eq!(selection.draws[1].quantity.value(), dec!(30));
        assert_eq!(selection.total_cost, dec!(860));
        assert!(selection.is_fully_covered());
        assert_eq!(selection.weighted_unit_cost(), Some(dec!(10.75)));
    }

    #[test]
    fn fefo_prefers_soonest_expiry_and_skips_expired() {
        let expired = candidate(dec!(10), dec!(1), None, Some(day(2024, 1, 10)), 0);
        let late = candidate(dec!(10), dec!(2), None, Some(day(2024, 9, 1)), 1);
        let soon = candidate(dec!(10), dec!(3), None, Some(day(2024, 5, 1)), 2);
        let never = candidate(dec!(10), dec!(4), None, None, -5);

        let selection = FefoBatchStrategy.select(
            qty(dec!(25)),
            &[never.clone(), late.clone(), expired, soon.clone()],
            day(2024, 4, 1),
        )
        .unwrap();

        let order: Vec<_> = selection.draws.iter().map(|d| d.batch_id).collect();
        assert_eq!(order, vec![soon.batch_id, late.batch_id, never.batch_id]);
        assert_eq!(selection.draws[2].quantity.value(), dec!(5));
        assert!(!selection.draws[2].fully_consumed());
    }

    #[test]
    fn shortfall_is_reported_as_uncovered() {
        let only = candidate(dec!(20), dec!(5), None, None, 0);
        let selection = FifoBatchStrategy
            .select(qty(dec!(30)), &[only.clone()], day(2024, 1, 2))
            .unwrap();

        assert_eq!(selection.drawn.value(), dec!(20));
        assert_eq!(selection.uncovered.value(), dec!(10));
        assert_eq!(selection.single_batch(), Some(only.batch_id));
        assert!(selection.draws[0].fully_consumed());
    }

    #[test]
    fn no_batches_means_nothing_drawn() {
        let selection = FifoBatchStrategy.select(qty(dec!(3)), &[], day(2024, 1, 2)).unwrap();
        assert_eq!(selection, BatchSelection::empty(qty(dec!(3))));
        assert_eq!(selection.weighted_unit_cost(), None);
    }

    #[test]
    fn draw_cost_out_of_range_is_an_error() {
        let costly = candidate(dec!(100000000000000000000), dec!(10000000000), None, None, 0);
        let err = FifoBatchStrategy
            .select(qty(dec!(100000000000000000000)), &[costly], day(2024, 1, 2))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        // Each draw fits on its own; their total does not.
        let half = candidate(dec!(25000000000000000000000000000), dec!(2), None, None, 0);
        let err = FefoBatchStrategy
            .select(qty(Decimal::MAX), &[half.clone(), half], day(2024, 1, 2))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn drawn_plus_uncovered_equals_requested(
            sizes in proptest::collection::vec(1i64..500, 0..8),
            requested in 1i64..3000,
        ) {
            let candidates: Vec<_> = sizes
                .iter()
                .enumerate()
                .map(|(i, s)| candidate(Decimal::from(*s), dec!(1), None, None, i as i64))
                .collect();
            let requested = qty(Decimal::from(requested));

            for selection in [
                FifoBatchStrategy.select(requested, &candidates, day(2024, 1, 2)).unwrap(),
                FefoBatchStrategy.select(requested, &candidates, day(2024, 1, 2)).unwrap(),
            ] {
                let accounted = selection.drawn.checked_add(selection.uncovered).unwrap();
                prop_assert_eq!(accounted, requested);
                let per_draw = checked_sum(selection.draws.iter().map(|d| d.quantity)).unwrap();
                prop_assert_eq!(per_draw, selection.drawn);
            }
        }
    }
}
