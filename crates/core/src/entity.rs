//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Locks, batches and ledger transactions are entities owned by (or recorded
/// against) an inventory item; they keep their identity while their status
/// changes.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
