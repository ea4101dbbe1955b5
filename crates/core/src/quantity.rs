//! Decimal quantities and costs.
//!
//! All stock quantities and costs are fixed-point decimals. `Quantity` is a
//! non-negative magnitude; signed deltas are plain `Decimal`s.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Decimal places kept on computed unit costs.
pub const COST_SCALE: u32 = 4;

/// Round a computed unit cost to [`COST_SCALE`] places, midpoint away from zero.
pub fn round_cost(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate a caller-supplied unit cost (must be >= 0).
pub fn ensure_cost(cost: Decimal) -> DomainResult<Decimal> {
    if cost.is_sign_negative() && !cost.is_zero() {
        return Err(DomainError::invalid_input(format!(
            "unit cost must be >= 0, got {cost}"
        )));
    }
    Ok(cost)
}

/// Sum decimal amounts, failing instead of overflowing.
pub fn checked_total(values: impl IntoIterator<Item = Decimal>) -> DomainResult<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| DomainError::invalid_input("amount exceeds the decimal range"))
    })
}

/// Non-negative stock quantity.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    /// Quantity >= 0.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::invalid_input(format!(
                "quantity must be >= 0, got {value}"
            )));
        }
        Ok(Self(value.normalize()))
    }

    /// Quantity > 0. Used for every movement (inbound, lock, count deltas).
    pub fn positive(value: Decimal) -> DomainResult<Self> {
        if value <= Decimal::ZERO {
            return Err(DomainError::invalid_input(format!(
                "quantity must be > 0, got {value}"
            )));
        }
        Ok(Self(value.normalize()))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// `None` when `rhs` is larger than `self`.
    pub fn checked_sub(self, rhs: Quantity) -> Option<Quantity> {
        if rhs.0 > self.0 {
            None
        } else {
            Some(Quantity((self.0 - rhs.0).normalize()))
        }
    }

    /// `self - rhs`, clamped at zero.
    pub fn saturating_sub(self, rhs: Quantity) -> Quantity {
        self.checked_sub(rhs).unwrap_or(Quantity::ZERO)
    }

    /// `self + rhs`; fails when the sum leaves the decimal range.
    pub fn checked_add(self, rhs: Quantity) -> DomainResult<Quantity> {
        self.0
            .checked_add(rhs.0)
            .map(|v| Quantity(v.normalize()))
            .ok_or_else(|| {
                DomainError::invalid_input(format!(
                    "quantity {self} + {rhs} exceeds the decimal range"
                ))
            })
    }

    /// `self + rhs`, clamped at the decimal range.
    pub fn saturating_add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(rhs.0).normalize())
    }

    /// Extended value of this quantity at `unit_cost`.
    pub fn checked_value_at(self, unit_cost: Decimal) -> DomainResult<Decimal> {
        self.0.checked_mul(unit_cost).ok_or_else(|| {
            DomainError::invalid_input(format!(
                "value of {self} at {unit_cost} exceeds the decimal range"
            ))
        })
    }
}

/// Fold quantities with [`Quantity::checked_add`].
pub fn checked_sum(quantities: impl IntoIterator<Item = Quantity>) -> DomainResult<Quantity> {
    quantities
        .into_iter()
        .try_fold(Quantity::ZERO, Quantity::checked_add)
}

impl ValueObject for Quantity {}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = DomainError;

    fn try_from(value: Decimal) -> DomainResult<Self> {
        Quantity::new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(q: Quantity) -> Decimal {
        q.0
    }
}
