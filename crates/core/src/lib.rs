//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy, optimistic-concurrency versioning and the
//! decimal quantity type every other crate computes with.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod quantity;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{AggregateId, ProductId, TenantId, UserId, WarehouseId};
pub use quantity::{COST_SCALE, Quantity, checked_sum, checked_total, ensure_cost, round_cost};
pub use rust_decimal::Decimal;
pub use value_object::ValueObject;
