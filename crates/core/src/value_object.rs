//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attribute values
/// (a unit of measure, a shortage line). They are immutable: to "modify" one,
/// build a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Unit(String);
///
/// impl ValueObject for Unit {}
///
/// assert_eq!(Unit("kg".into()), Unit("kg".into()));
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
