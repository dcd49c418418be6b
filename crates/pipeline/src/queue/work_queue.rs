//! Sequential work queue for one run.

use tracing::debug;

use fleetsync_core::DeviceReference;

use super::types::{ItemStatus, QueueItem, RetryPolicy};
use crate::classify::ItemError;
use crate::ports::UpsertAck;

/// Ordered work list of device items.
///
/// `dequeue_next` hands out the eligible item with the fewest attempts,
/// ties broken by insertion order. Every `Pending` item (zero attempts) is
/// therefore offered before any `Retryable` one, and retry passes walk the
/// survivors round-robin instead of hammering a single slow item.
///
/// Items leave the active pool while in progress and come back only through
/// [`mark_retryable`](Self::mark_retryable); terminal items are archived.
#[derive(Debug)]
pub struct WorkQueue {
    policy: RetryPolicy,
    next_seq: u64,
    active: Vec<QueueItem>,
    completed: Vec<QueueItem>,
    failed: Vec<QueueItem>,
}

/// Terminal items drained from a queue.
#[derive(Debug, Default)]
pub struct Archive {
    pub completed: Vec<QueueItem>,
    pub failed: Vec<QueueItem>,
}

impl WorkQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            next_seq: 0,
            active: Vec::new(),
            completed: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Append a new `Pending` item. No uniqueness check at this layer.
    pub fn enqueue(&mut self, payload: DeviceReference) {
        let item = QueueItem::new(self.next_seq, payload);
        self.next_seq += 1;
        self.active.push(item);
    }

    /// Hand out the next eligible item, marked `InProgress` with its attempt
    /// counted. `None` when nothing is `Pending` or `Retryable`.
    pub fn dequeue_next(&mut self) -> Option<QueueItem> {
        let idx = self
            .active
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status.is_eligible())
            .min_by_key(|(_, item)| (item.attempt_count, item.seq))
            .map(|(idx, _)| idx)?;

        let mut item = self.active.remove(idx);
        item.mark_in_progress();
        Some(item)
    }

    pub fn complete(&mut self, mut item: QueueItem, ack: UpsertAck) {
        item.ack = Some(ack);
        item.finish_attempt(ItemStatus::Completed, None);
        self.completed.push(item);
    }

    /// Put the item back for another pass, or fail it once the attempt cap
    /// is reached. Returns the resulting status.
    pub fn mark_retryable(&mut self, mut item: QueueItem, error: ItemError) -> ItemStatus {
        if self.policy.should_retry(item.attempt_count) {
            item.finish_attempt(ItemStatus::Retryable, Some(error));
            self.active.push(item);
            ItemStatus::Retryable
        } else {
            debug!(
                device_id = %item.device_id(),
                attempts = item.attempt_count,
                "attempt cap reached"
            );
            item.finish_attempt(ItemStatus::Failed, Some(error));
            self.failed.push(item);
            ItemStatus::Failed
        }
    }

    /// Terminal, non-retryable failure.
    pub fn mark_failed(&mut self, mut item: QueueItem, error: ItemError) {
        item.finish_attempt(ItemStatus::Failed, Some(error));
        self.failed.push(item);
    }

    /// No `Pending` or `Retryable` item remains.
    pub fn is_empty(&self) -> bool {
        !self.active.iter().any(|item| item.status.is_eligible())
    }

    pub fn pending_len(&self) -> usize {
        self.active.len()
    }

    pub fn completed(&self) -> &[QueueItem] {
        &self.completed
    }

    pub fn failed(&self) -> &[QueueItem] {
        &self.failed
    }

    /// Consume the queue, returning terminal items in insertion order.
    pub fn into_archive(self) -> Archive {
        let mut completed = self.completed;
        let mut failed = self.failed;
        completed.sort_by_key(|item| item.seq);
        failed.sort_by_key(|item| item.seq);
        Archive { completed, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorClass;
    use fleetsync_core::DeviceId;
    use proptest::prelude::*;

    fn reference(id: &str) -> DeviceReference {
        DeviceReference::new(DeviceId::new(id).unwrap())
    }

    fn transient() -> ItemError {
        ItemError::new(ErrorClass::StoreUnavailable, "connection reset")
    }

    /// Drain up to `n` items, completing each, and return their ids.
    fn ids(queue: &mut WorkQueue, n: usize) -> Vec<String> {
        let mut out = Vec::new();
        for _ in 0..n {
            let Some(item) = queue.dequeue_next() else { break };
            out.push(item.device_id().to_string());
            queue.complete(item, UpsertAck::Inserted);
        }
        out
    }

    #[test]
    fn enqueue_and_dequeue_in_insertion_order() {
        let mut queue = WorkQueue::new(RetryPolicy::immediate(3));
        for id in ["a", "b", "c"] {
            queue.enqueue(reference(id));
        }

        let item = queue.dequeue_next().unwrap();
        assert_eq!(item.status(), ItemStatus::InProgress);
        assert_eq!(item.attempt_count(), 1);
        queue.complete(item, UpsertAck::Inserted);

        assert_eq!(ids(&mut queue, 5), vec!["b", "c"]);
        assert!(queue.is_empty());
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn retryable_items_wait_for_pending_ones() {
        let mut queue = WorkQueue::new(RetryPolicy::immediate(3));
        for id in ["a", "b", "c"] {
            queue.enqueue(reference(id));
        }

        let a = queue.dequeue_next().unwrap();
        assert_eq!(queue.mark_retryable(a, transient()), ItemStatus::Retryable);

        assert_eq!(ids(&mut queue, 3), vec!["b", "c", "a"]);
    }

    #[test]
    fn retry_pass_is_round_robin() {
        let mut queue = WorkQueue::new(RetryPolicy::immediate(5));
        queue.enqueue(reference("a"));
        queue.enqueue(reference("b"));

        let mut order = Vec::new();
        for _ in 0..4 {
            let item = queue.dequeue_next().unwrap();
            order.push((item.device_id().to_string(), item.attempt_count()));
            queue.mark_retryable(item, transient());
        }

        assert_eq!(
            order,
            vec![
                ("a".to_string(), 1),
                ("b".to_string(), 1),
                ("a".to_string(), 2),
                ("b".to_string(), 2),
            ]
        );
    }

    #[test]
    fn cap_turns_retryable_into_failed() {
        let mut queue = WorkQueue::new(RetryPolicy::immediate(2));
        queue.enqueue(reference("a"));

        let item = queue.dequeue_next().unwrap();
        assert_eq!(queue.mark_retryable(item, transient()), ItemStatus::Retryable);

        let item = queue.dequeue_next().unwrap();
        assert_eq!(item.attempt_count(), 2);
        assert_eq!(queue.mark_retryable(item, transient()), ItemStatus::Failed);

        assert!(queue.is_empty());
        let failed = &queue.failed()[0];
        assert_eq!(failed.status(), ItemStatus::Failed);
        assert_eq!(failed.last_error().unwrap().class, ErrorClass::StoreUnavailable);
        assert_eq!(failed.history().len(), 2);
    }

    #[test]
    fn mark_failed_is_terminal() {
        let mut queue = WorkQueue::new(RetryPolicy::immediate(3));
        queue.enqueue(reference("a"));

        let item = queue.dequeue_next().unwrap();
        queue.mark_failed(item, ItemError::new(ErrorClass::DeviceNotFound, "404"));

        assert!(queue.is_empty());
        assert_eq!(queue.failed()[0].attempt_count(), 1);
        assert_eq!(queue.failed()[0].occurrences(ErrorClass::DeviceNotFound), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: with failures driven by an arbitrary script, every
        /// enqueued item ends up archived exactly once and no item exceeds
        /// the attempt cap.
        #[test]
        fn every_item_terminates_exactly_once(
            n in 1usize..20,
            cap in 1u32..5,
            script in prop::collection::vec(0u8..3, 0..200),
        ) {
            let mut queue = WorkQueue::new(RetryPolicy::immediate(cap));
            for i in 0..n {
                queue.enqueue(reference(&format!("dev-{i}")));
            }

            let mut steps = script.into_iter().chain(std::iter::repeat(0));
            let mut guard = 0usize;
            while let Some(item) = queue.dequeue_next() {
                guard += 1;
                prop_assert!(guard <= n * cap as usize);
                prop_assert!(item.attempt_count() <= cap);
                match steps.next().unwrap_or(0) {
                    0 => queue.complete(item, UpsertAck::Updated),
                    1 => { queue.mark_retryable(item, transient()); }
                    _ => queue.mark_failed(item, ItemError::new(ErrorClass::InvalidData, "bad")),
                }
            }

            let archive = queue.into_archive();
            let mut seen: Vec<String> = archive
                .completed
                .iter()
                .chain(archive.failed.iter())
                .map(|item| item.device_id().to_string())
                .collect();
            prop_assert_eq!(seen.len(), n);
            seen.sort();
            seen.dedup();
            prop_assert_eq!(seen.len(), n);
        }
    }
}
