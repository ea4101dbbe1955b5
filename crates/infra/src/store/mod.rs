//! Inventory storage boundary.
//!
//! The engine never assumes a particular backend: services read through
//! [`InventoryStore`] and write every mutation as one [`UnitOfWork`], so the
//! item, its ledger entry and any lock change land together or not at all.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use r#trait::{InventoryStore, LockWrite, StoreError, UnitOfWork};
