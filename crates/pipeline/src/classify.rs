//! Failure classification: which errors are worth another attempt.
//!
//! Every adapter error is reduced to an [`ErrorClass`]; the
//! [`ClassificationPolicy`] then maps the class (and how often it already
//! occurred on the item) to a [`Verdict`]. The queue's attempt cap bounds
//! every retry regardless of the verdict.

use std::collections::BTreeMap;
use std::fmt;

use fleetsync_core::DomainError;
use serde::{Deserialize, Serialize};

use crate::ports::{SourceError, StoreError};

/// Classification of an item-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    SourceUnavailable,
    StoreUnavailable,
    Timeout,
    AuthFailure,
    DeviceNotFound,
    InvalidData,
    ConstraintViolation,
    /// Error shape nobody anticipated.
    Unclassified,
}

impl ErrorClass {
    pub const ALL: [ErrorClass; 8] = [
        ErrorClass::SourceUnavailable,
        ErrorClass::StoreUnavailable,
        ErrorClass::Timeout,
        ErrorClass::AuthFailure,
        ErrorClass::DeviceNotFound,
        ErrorClass::InvalidData,
        ErrorClass::ConstraintViolation,
        ErrorClass::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::SourceUnavailable => "source_unavailable",
            ErrorClass::StoreUnavailable => "store_unavailable",
            ErrorClass::Timeout => "timeout",
            ErrorClass::AuthFailure => "auth_failure",
            ErrorClass::DeviceNotFound => "device_not_found",
            ErrorClass::InvalidData => "invalid_data",
            ErrorClass::ConstraintViolation => "constraint_violation",
            ErrorClass::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SourceError> for ErrorClass {
    fn from(err: &SourceError) -> Self {
        match err {
            SourceError::Unavailable(_) => ErrorClass::SourceUnavailable,
            SourceError::Timeout(_) => ErrorClass::Timeout,
            SourceError::Unauthorized(_) => ErrorClass::AuthFailure,
            SourceError::NotFound(_) => ErrorClass::DeviceNotFound,
            SourceError::Malformed(_) => ErrorClass::InvalidData,
            SourceError::Other(_) => ErrorClass::Unclassified,
        }
    }
}

impl From<&StoreError> for ErrorClass {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => ErrorClass::StoreUnavailable,
            StoreError::Timeout(_) => ErrorClass::Timeout,
            StoreError::Unauthorized(_) => ErrorClass::AuthFailure,
            StoreError::ConstraintViolation(_) => ErrorClass::ConstraintViolation,
            StoreError::Other(_) => ErrorClass::Unclassified,
        }
    }
}

impl From<&DomainError> for ErrorClass {
    fn from(_: &DomainError) -> Self {
        ErrorClass::InvalidData
    }
}

/// Classified failure recorded on a queue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{class}: {message}")]
pub struct ItemError {
    pub class: ErrorClass,
    pub message: String,
}

impl ItemError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

impl From<&SourceError> for ItemError {
    fn from(err: &SourceError) -> Self {
        Self::new(err.into(), err.to_string())
    }
}

impl From<&StoreError> for ItemError {
    fn from(err: &StoreError) -> Self {
        Self::new(err.into(), err.to_string())
    }
}

impl From<&DomainError> for ItemError {
    fn from(err: &DomainError) -> Self {
        Self::new(err.into(), err.to_string())
    }
}

/// How a class of failure is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Disposition {
    /// Retry, bounded only by the attempt cap.
    Transient,
    /// Retry at most `retries` times for this class, then give up.
    Bounded { retries: u32 },
    /// Give up immediately.
    Permanent,
}

/// What to do with an item after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Retry,
    Fail,
}

/// Class → disposition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationPolicy {
    table: BTreeMap<ErrorClass, Disposition>,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        let table = ErrorClass::ALL
            .into_iter()
            .map(|class| {
                let disposition = match class {
                    ErrorClass::SourceUnavailable
                    | ErrorClass::StoreUnavailable
                    | ErrorClass::Timeout
                    | ErrorClass::Unclassified => Disposition::Transient,
                    ErrorClass::AuthFailure => Disposition::Bounded { retries: 1 },
                    ErrorClass::DeviceNotFound
                    | ErrorClass::InvalidData
                    | ErrorClass::ConstraintViolation => Disposition::Permanent,
                };
                (class, disposition)
            })
            .collect();
        Self { table }
    }
}

impl ClassificationPolicy {
    /// Override the disposition of one class.
    pub fn with(mut self, class: ErrorClass, disposition: Disposition) -> Self {
        self.table.insert(class, disposition);
        self
    }

    pub fn disposition(&self, class: ErrorClass) -> Disposition {
        self.table
            .get(&class)
            .copied()
            .unwrap_or(Disposition::Transient)
    }

    /// Decide the fate of a failure of `class`, given how many earlier
    /// attempts of the same item already failed with that class.
    pub fn verdict(&self, class: ErrorClass, prior_occurrences: u32) -> Verdict {
        match self.disposition(class) {
            Disposition::Transient => Verdict::Retry,
            Disposition::Bounded { retries } if prior_occurrences < retries => Verdict::Retry,
            Disposition::Bounded { .. } => Verdict::Fail,
            Disposition::Permanent => Verdict::Fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_error_taxonomy() {
        let policy = ClassificationPolicy::default();

        for class in [
            ErrorClass::SourceUnavailable,
            ErrorClass::StoreUnavailable,
            ErrorClass::Timeout,
            ErrorClass::Unclassified,
        ] {
            assert_eq!(policy.verdict(class, 0), Verdict::Retry, "{class}");
            assert_eq!(policy.verdict(class, 10), Verdict::Retry, "{class}");
        }

        for class in [
            ErrorClass::DeviceNotFound,
            ErrorClass::InvalidData,
            ErrorClass::ConstraintViolation,
        ] {
            assert_eq!(policy.verdict(class, 0), Verdict::Fail, "{class}");
        }
    }

    #[test]
    fn auth_failure_is_retried_once() {
        let policy = ClassificationPolicy::default();
        assert_eq!(policy.verdict(ErrorClass::AuthFailure, 0), Verdict::Retry);
        assert_eq!(policy.verdict(ErrorClass::AuthFailure, 1), Verdict::Fail);
    }

    #[test]
    fn overrides_replace_defaults() {
        let policy = ClassificationPolicy::default()
            .with(ErrorClass::AuthFailure, Disposition::Permanent)
            .with(ErrorClass::DeviceNotFound, Disposition::Bounded { retries: 2 });

        assert_eq!(policy.verdict(ErrorClass::AuthFailure, 0), Verdict::Fail);
        assert_eq!(policy.verdict(ErrorClass::DeviceNotFound, 1), Verdict::Retry);
        assert_eq!(policy.verdict(ErrorClass::DeviceNotFound, 2), Verdict::Fail);
    }

    #[test]
    fn adapter_errors_map_to_classes() {
        assert_eq!(
            ErrorClass::from(&SourceError::NotFound("x".into())),
            ErrorClass::DeviceNotFound
        );
        assert_eq!(
            ErrorClass::from(&SourceError::Malformed("x".into())),
            ErrorClass::InvalidData
        );
        assert_eq!(
            ErrorClass::from(&StoreError::Unauthorized("x".into())),
            ErrorClass::AuthFailure
        );
        assert_eq!(
            ErrorClass::from(&StoreError::Other("x".into())),
            ErrorClass::Unclassified
        );
    }

    #[test]
    fn item_error_display_carries_class() {
        let err = ItemError::from(&StoreError::ConstraintViolation("fk_org_unit".into()));
        assert_eq!(err.class, ErrorClass::ConstraintViolation);
        assert_eq!(err.to_string(), "constraint_violation: constraint violation: fk_org_unit");
    }
}
