//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures of the data itself
/// (validation, malformed identifiers). Transport and storage concerns belong
/// to the adapter error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A required field was absent from a payload.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// An identifier was invalid (e.g. empty).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A hardware address could not be normalized.
    #[error("invalid hardware address: {0}")]
    InvalidHardwareAddress(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_hardware_address(msg: impl Into<String>) -> Self {
        Self::InvalidHardwareAddress(msg.into())
    }
}
