//! `stockledger-strategy`: named, swappable algorithms.
//!
//! Behaviour that varies by tenant policy (which batch to draw first, how to
//! value an outbound movement, how to price, allocate or validate) lives here
//! behind per-family traits. Each family has a registry addressable by name
//! with a declared default; [`StrategyRegistry`] bundles the five families and
//! adds tenant-level overrides.

pub mod allocation;
pub mod batch;
pub mod cost;
pub mod pricing;
pub mod registry;
pub mod strategy;
pub mod validation;

pub use allocation::{
    Allocation, AllocationResult, AllocationStrategy, AllocationTarget, DueDateAllocation,
    FifoAllocation,
};
pub use batch::{
    BatchCandidate, BatchDraw, BatchSelection, BatchStrategy, FefoBatchStrategy,
    FifoBatchStrategy,
};
pub use cost::{CostStrategy, FifoCost, MovingAverageCost};
pub use pricing::{
    PriceTier, PricingContext, PricingResult, PricingStrategy, StandardPricing, TieredPricing,
};
pub use registry::{FamilyRegistry, Registry, StrategyRegistry};
pub use strategy::{Strategy, StrategyFamily, StrategyInfo};
pub use validation::{ProductAttributes, StandardValidation, StrictValidation, ValidationStrategy};
