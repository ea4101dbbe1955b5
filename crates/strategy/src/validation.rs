//! Product master-data validation rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult};

use crate::strategy::{Strategy, StrategyFamily};

/// Product fields the ledger cares about when a product is set up for stock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAttributes {
    pub code: String,
    pub name: String,
    pub unit: String,
    pub purchase_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub min_stock: Option<Decimal>,
    pub max_stock: Option<Decimal>,
}

pub trait ValidationStrategy: Strategy {
    fn validate(&self, product: &ProductAttributes) -> DomainResult<()>;
}

fn require(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::invalid_input(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn non_negative(field: &str, value: Option<Decimal>) -> DomainResult<()> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(DomainError::invalid_input(format!(
            "{field} must be >= 0, got {v}"
        ))),
        _ => Ok(()),
    }
}

/// Required fields present, no negative numbers, `min_stock <= max_stock`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardValidation;

impl StandardValidation {
    pub const NAME: &'static str = "standard";
}

impl Strategy for StandardValidation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Validation
    }

    fn description(&self) -> &str {
        "Standard validation: required fields, non-negative prices and consistent stock thresholds"
    }
}

impl ValidationStrategy for StandardValidation {
    fn validate(&self, product: &ProductAttributes) -> DomainResult<()> {
        require("code", &product.code)?;
        require("name", &product.name)?;
        require("unit", &product.unit)?;
        non_negative("purchase_price", product.purchase_price)?;
        non_negative("selling_price", product.selling_price)?;
        non_negative("min_stock", product.min_stock)?;
        non_negative("max_stock", product.max_stock)?;
        if let (Some(min), Some(max)) = (product.min_stock, product.max_stock) {
            if min > max {
                return Err(DomainError::invalid_input(format!(
                    "min_stock {min} exceeds max_stock {max}"
                )));
            }
        }
        Ok(())
    }
}

/// Standard rules plus code format, length limits and no selling below cost.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictValidation;

impl StrictValidation {
    pub const NAME: &'static str = "strict";
    const MAX_CODE_LEN: usize = 50;
    const MAX_NAME_LEN: usize = 200;
}

impl Strategy for StrictValidation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Validation
    }

    fn description(&self) -> &str {
        "Strict validation: standard rules plus code format, length limits and selling price not below purchase price"
    }
}

impl ValidationStrategy for StrictValidation {
    fn validate(&self, product: &ProductAttributes) -> DomainResult<()> {
        StandardValidation.validate(product)?;

        let code = product.code.trim();
        if code.len() > Self::MAX_CODE_LEN {
            return Err(DomainError::invalid_input(format!(
                "code longer than {} characters",
                Self::MAX_CODE_LEN
            )));
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::invalid_input(
                "code may only contain letters, digits, '-' and '_'",
            ));
        }
        if product.name.trim().chars().count() > Self::MAX_NAME_LEN {
            return Err(DomainError::invalid_input(format!(
                "name longer than {} characters",
                Self::MAX_NAME_LEN
            )));
        }
        if let (Some(buy), Some(sell)) = (product.purchase_price, product.selling_price) {
            if sell < buy {
                return Err(DomainError::invalid_input(format!(
                    "selling_price {sell} is below purchase_price {buy}"
                )));
            }
        }
        Ok(())
    }
}
