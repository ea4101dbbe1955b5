//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. A
/// [`crate::Quantity`] of `10.5` equals any other `10.5`; a source reference
/// `("sales_order", "SO-001")` equals any other with the same pair. To
/// "change" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
