//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values
/// (e.g. a plan `Price`); entities are compared by identity.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
