//! Value object trait: equality by value, not identity.
//!
//! A value object is defined entirely by its attributes. `Price` is one; a
//! `CartEntry` is not (it is an entity, identified by its `EntryId`).

/// Marker trait for value objects.
///
/// Value objects are immutable; "changing" one means building a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
