//! Queue item types and the retry policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetsync_core::{DeviceId, DeviceReference};

use crate::classify::{ErrorClass, ItemError};
use crate::ports::UpsertAck;

/// Item processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Seeded, never attempted
    Pending,
    /// Handed out for the current attempt
    InProgress,
    /// Persisted
    Completed,
    /// Failed transiently, waiting for the next pass
    Retryable,
    /// Gave up
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }

    /// Eligible to be handed out by the queue.
    pub fn is_eligible(&self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Retryable)
    }
}

/// Backoff strategy between retry passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between passes
    Fixed,
    /// Exponential backoff: base * 2^(pass-1)
    #[default]
    Exponential,
    /// Linear backoff: base * pass
    Linear,
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts per item, first attempt included.
    pub max_attempts: u32,
    /// Base delay before a retry pass
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Retry passes start immediately.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Attempt cap, never below one.
    pub fn cap(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retry pass `pass` (1-indexed: the first retry pass is 1).
    pub fn delay_for_pass(&self, pass: u32) -> Duration {
        if pass == 0 {
            return Duration::ZERO;
        }

        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(pass - 1);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(pass),
        };

        delay.min(self.max_delay)
    }

    /// Check if another attempt is allowed after `attempts` attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.cap()
    }
}

/// Record of one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub error: Option<ItemError>,
    pub duration_ms: u64,
}

/// One device in flight.
///
/// Fields are private: only the queue moves an item between states, which
/// keeps the attempt cap enforced in one place.
#[derive(Debug, Clone, Serialize)]
pub struct QueueItem {
    pub(crate) seq: u64,
    pub(crate) payload: DeviceReference,
    pub(crate) status: ItemStatus,
    pub(crate) attempt_count: u32,
    pub(crate) last_error: Option<ItemError>,
    pub(crate) ack: Option<UpsertAck>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) history: Vec<AttemptRecord>,
}

impl QueueItem {
    pub(crate) fn new(seq: u64, payload: DeviceReference) -> Self {
        Self {
            seq,
            payload,
            status: ItemStatus::Pending,
            attempt_count: 0,
            last_error: None,
            ack: None,
            started_at: None,
            history: Vec::new(),
        }
    }

    pub fn payload(&self) -> &DeviceReference {
        &self.payload
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.payload.device_id
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn last_error(&self) -> Option<&ItemError> {
        self.last_error.as_ref()
    }

    pub fn ack(&self) -> Option<UpsertAck> {
        self.ack
    }

    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    /// How many finished attempts failed with `class`.
    pub fn occurrences(&self, class: ErrorClass) -> u32 {
        let count = self
            .history
            .iter()
            .filter(|r| r.error.as_ref().is_some_and(|e| e.class == class))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub(crate) fn mark_in_progress(&mut self) {
        self.status = ItemStatus::InProgress;
        self.attempt_count += 1;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn finish_attempt(&mut self, status: ItemStatus, error: Option<ItemError>) {
        let now = Utc::now();
        let started_at = self.started_at.take().unwrap_or(now);
        self.history.push(AttemptRecord {
            attempt: self.attempt_count,
            started_at,
            finished_at: now,
            error: error.clone(),
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
        });
        self.status = status;
        self.last_error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_calculates_correctly() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            strategy: BackoffStrategy::Exponential,
        };

        assert_eq!(policy.delay_for_pass(0), Duration::ZERO);
        assert_eq!(policy.delay_for_pass(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_pass(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_pass(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_pass(40), Duration::from_secs(10));
    }

    #[test]
    fn linear_backoff_increases_linearly() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            strategy: BackoffStrategy::Linear,
        };

        assert_eq!(policy.delay_for_pass(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_pass(3), Duration::from_millis(300));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));
        assert_eq!(policy.delay_for_pass(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_pass(3), Duration::from_millis(500));
    }

    #[test]
    fn should_retry_respects_cap() {
        let policy = RetryPolicy::immediate(3);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));

        let zero = RetryPolicy::immediate(0);
        assert_eq!(zero.cap(), 1);
        assert!(!zero.should_retry(1));
    }

    #[test]
    fn occurrences_count_only_the_matching_class() {
        let mut item = QueueItem::new(0, DeviceReference::new(DeviceId::new("a").unwrap()));
        for class in [ErrorClass::AuthFailure, ErrorClass::Timeout, ErrorClass::AuthFailure] {
            item.mark_in_progress();
            item.finish_attempt(ItemStatus::Retryable, Some(ItemError::new(class, "x")));
        }
        item.mark_in_progress();
        item.finish_attempt(ItemStatus::Completed, None);

        assert_eq!(item.occurrences(ErrorClass::AuthFailure), 2);
        assert_eq!(item.occurrences(ErrorClass::Timeout), 1);
        assert_eq!(item.occurrences(ErrorClass::StoreUnavailable), 0);
        assert_eq!(item.attempt_count(), 4);
        assert_eq!(item.history().len(), 4);
    }
}
