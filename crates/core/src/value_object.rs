//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values
/// (a `Shortfall`, a BOM line, a unit). Entities, by contrast, are compared by id.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
