//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Constructors
/// validate and canonicalize, so two value objects built from differently
/// formatted inputs that mean the same thing compare equal.
///
/// ```ignore
/// let a: HardwareAddress = "aa-bb-cc-dd-ee-ff".parse()?;
/// let b: HardwareAddress = "AABBCCDDEEFF".parse()?;
/// assert_eq!(a, b);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
