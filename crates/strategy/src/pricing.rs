//! Selling-price calculation.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Quantity};

use crate::strategy::{Strategy, StrategyFamily};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingContext {
    pub base_price: Decimal,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub discount_amount: Decimal,
    /// Percentage of the base total, two decimal places.
    pub discount_percent: Decimal,
    pub applied_rules: Vec<String>,
}

pub trait PricingStrategy: Strategy {
    fn price(&self, ctx: &PricingContext) -> DomainResult<PricingResult>;

    fn supports_tiers(&self) -> bool {
        false
    }
}

/// Base price, no discounts.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardPricing;

impl StandardPricing {
    pub const NAME: &'static str = "standard";
}

impl Strategy for StandardPricing {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Pricing
    }

    fn description(&self) -> &str {
        "Standard pricing uses the product's base selling price"
    }
}

impl PricingStrategy for StandardPricing {
    fn price(&self, ctx: &PricingContext) -> DomainResult<PricingResult> {
        Ok(PricingResult {
            unit_price: ctx.base_price,
            total_price: ctx.quantity.checked_value_at(ctx.base_price)?,
            discount_amount: Decimal::ZERO,
            discount_percent: Decimal::ZERO,
            applied_rules: vec!["standard_pricing".to_string()],
        })
    }
}

/// Quantity band with its own unit price. `max_quantity` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    pub min_quantity: Decimal,
    pub max_quantity: Option<Decimal>,
    pub unit_price: Decimal,
}

impl PriceTier {
    fn covers(&self, quantity: Decimal) -> bool {
        quantity >= self.min_quantity && self.max_quantity.is_none_or(|max| quantity < max)
    }
}

/// Unit price from the highest tier the quantity qualifies for.
#[derive(Debug, Clone, Default)]
pub struct TieredPricing {
    tiers: Vec<PriceTier>,
}

impl TieredPricing {
    pub const NAME: &'static str = "tiered";

    pub fn new(mut tiers: Vec<PriceTier>) -> Self {
        tiers.sort_by(|a, b| a.min_quantity.cmp(&b.min_quantity));
        Self { tiers }
    }

    pub fn tiers(&self) -> &[PriceTier] {
        &self.tiers
    }

    fn unit_price_for(&self, quantity: Decimal, base_price: Decimal) -> Decimal {
        self.tiers
            .iter()
            .rev()
            .find(|t| t.covers(quantity))
            .map(|t| t.unit_price)
            .unwrap_or(base_price)
    }
}

impl Strategy for TieredPricing {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Pricing
    }

    fn description(&self) -> &str {
        "Tiered pricing applies different unit prices based on quantity ranges"
    }
}

impl PricingStrategy for TieredPricing {
    fn price(&self, ctx: &PricingContext) -> DomainResult<PricingResult> {
        let unit_price = self.unit_price_for(ctx.quantity.value(), ctx.base_price);
        let total_price = ctx.quantity.checked_value_at(unit_price)?;
        let base_total = ctx.quantity.checked_value_at(ctx.base_price)?;
        let discount_amount = base_total
            .checked_sub(total_price)
            .ok_or_else(|| DomainError::invalid_input("discount exceeds the decimal range"))?;

        let discount_percent = if base_total.is_zero() {
            Decimal::ZERO
        } else {
            discount_amount
                .checked_div(base_total)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .map(|p| p.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
                .ok_or_else(|| DomainError::invalid_input("discount exceeds the decimal range"))?
        };

        let mut applied_rules = vec!["tiered_pricing".to_string()];
        if discount_amount > Decimal::ZERO {
            applied_rules.push("quantity_discount".to_string());
        }

        Ok(PricingResult {
            unit_price,
            total_price,
            discount_amount,
            discount_percent,
            applied_rules,
        })
    }

    fn supports_tiers(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ctx(price: Decimal, qty: Decimal) -> PricingContext {
        PricingContext {
            base_price: price,
            quantity: Quantity::new(qty).unwrap(),
        }
    }

    fn tiers() -> TieredPricing {
        TieredPricing::new(vec![
            PriceTier {
                min_quantity: dec!(100),
                max_quantity: None,
                unit_price: dec!(8),
            },
            PriceTier {
                min_quantity: dec!(10),
                max_quantity: Some(dec!(100)),
                unit_price: dec!(9),
            },
        ])
    }

    #[test]
    fn standard_multiplies_base_price() {
        let result = StandardPricing.price(&ctx(dec!(12.5), dec!(4))).unwrap();
        assert_eq!(result.total_price, dec!(50));
        assert_eq!(result.discount_amount, Decimal::ZERO);
        assert!(!StandardPricing.supports_tiers());
    }

    #[test]
    fn tiered_picks_band_by_quantity() {
        let pricing = tiers();
        assert_eq!(pricing.tiers()[0].min_quantity, dec!(10));

        let small = pricing.price(&ctx(dec!(10), dec!(5))).unwrap();
        assert_eq!(small.unit_price, dec!(10));
        assert_eq!(small.applied_rules, vec!["tiered_pricing".to_string()]);

        let mid = pricing.price(&ctx(dec!(10), dec!(50))).unwrap();
        assert_eq!(mid.unit_price, dec!(9));
        assert_eq!(mid.discount_amount, dec!(50));
        assert_eq!(mid.discount_percent, dec!(10));
        assert!(mid.applied_rules.contains(&"quantity_discount".to_string()));

        let bulk = pricing.price(&ctx(dec!(10), dec!(100))).unwrap();
        assert_eq!(bulk.unit_price, dec!(8));
    }

    #[test]
    fn tiered_without_tiers_is_base_price() {
        let result = TieredPricing::new(Vec::new()).price(&ctx(dec!(3), dec!(7))).unwrap();
        assert_eq!(result.total_price, dec!(21));
    }

    #[test]
    fn totals_out_of_range_are_rejected() {
        let huge = ctx(dec!(10000000000), dec!(100000000000000000000));
        assert_eq!(StandardPricing.price(&huge).unwrap_err().code(), "INVALID_INPUT");
        assert!(tiers().price(&huge).is_err());
    }
}
