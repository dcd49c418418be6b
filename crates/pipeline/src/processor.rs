//! Item processor: one attempt for one queue item.

use std::time::Duration;

use tracing::{debug, instrument};

use fleetsync_core::{DeviceRecord, TenantId};

use crate::classify::{ClassificationPolicy, ErrorClass, ItemError, Verdict};
use crate::ports::{DeviceSource, RecordStore, UpsertAck};
use crate::queue::QueueItem;

/// Classified result of one attempt; the caller routes it into the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed(UpsertAck),
    Retryable(ItemError),
    Failed(ItemError),
}

/// Drives one item through detail fetch, validation and upsert.
///
/// Adapter errors never escape: each is classified into an [`ItemOutcome`].
/// Per attempt there is exactly one read and at most one write; a record that
/// fails validation is never written.
pub struct ItemProcessor<'a, S, T> {
    tenant_id: &'a TenantId,
    source: &'a S,
    store: &'a T,
    policy: &'a ClassificationPolicy,
    api_timeout: Duration,
    store_timeout: Duration,
}

impl<'a, S, T> ItemProcessor<'a, S, T>
where
    S: DeviceSource,
    T: RecordStore,
{
    pub fn new(
        tenant_id: &'a TenantId,
        source: &'a S,
        store: &'a T,
        policy: &'a ClassificationPolicy,
    ) -> Self {
        Self {
            tenant_id,
            source,
            store,
            policy,
            api_timeout: crate::config::DEFAULT_CALL_TIMEOUT,
            store_timeout: crate::config::DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, api: Duration, store: Duration) -> Self {
        self.api_timeout = api;
        self.store_timeout = store;
        self
    }

    #[instrument(
        skip(self, item),
        fields(device_id = %item.device_id(), attempt = item.attempt_count())
    )]
    pub async fn process(&self, item: &QueueItem) -> ItemOutcome {
        let device_id = item.device_id();

        let detail = match tokio::time::timeout(
            self.api_timeout,
            self.source.get_device_detail(device_id),
        )
        .await
        {
            Ok(Ok(detail)) => detail,
            Ok(Err(err)) => return self.classify(item, ItemError::from(&err)),
            Err(_) => {
                return self.classify(
                    item,
                    ItemError::new(
                        ErrorClass::Timeout,
                        format!("detail fetch exceeded {:?}", self.api_timeout),
                    ),
                );
            }
        };

        let record = match DeviceRecord::from_detail(self.tenant_id.clone(), device_id.clone(), detail) {
            Ok(record) => record,
            Err(err) => return self.classify(item, ItemError::from(&err)),
        };

        match tokio::time::timeout(self.store_timeout, self.store.upsert(&record)).await {
            Ok(Ok(ack)) => {
                debug!(hardware_address = %record.hardware_address, ?ack, "device persisted");
                ItemOutcome::Completed(ack)
            }
            Ok(Err(err)) => self.classify(item, ItemError::from(&err)),
            Err(_) => self.classify(
                item,
                ItemError::new(
                    ErrorClass::Timeout,
                    format!("upsert exceeded {:?}", self.store_timeout),
                ),
            ),
        }
    }

    fn classify(&self, item: &QueueItem, error: ItemError) -> ItemOutcome {
        let prior = item.occurrences(error.class);
        let verdict = self.policy.verdict(error.class, prior);
        debug!(class = %error.class, prior, ?verdict, error = %error.message, "attempt failed");
        match verdict {
            Verdict::Retry => ItemOutcome::Retryable(error),
            Verdict::Fail => ItemOutcome::Failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryDeviceSource, InMemoryRecordStore};
    use crate::ports::{SourceError, StoreError};
    use crate::queue::{RetryPolicy, WorkQueue};
    use fleetsync_core::{DeviceDetail, DeviceId};

    fn tenant() -> TenantId {
        TenantId::new("C01tenant").unwrap()
    }

    fn detail(id: &str, mac: &str) -> DeviceDetail {
        DeviceDetail {
            device_id: Some(id.to_string()),
            serial_number: Some(format!("SN-{id}")),
            hardware_address_raw: Some(mac.to_string()),
            ..Default::default()
        }
    }

    fn first_item(source: &InMemoryDeviceSource) -> (WorkQueue, QueueItem) {
        let mut queue = WorkQueue::new(RetryPolicy::immediate(3));
        for reference in source.references() {
            queue.enqueue(reference);
        }
        let item = queue.dequeue_next().unwrap();
        (queue, item)
    }

    #[tokio::test]
    async fn successful_attempt_persists_normalized_record() {
        let source = InMemoryDeviceSource::new(vec![detail("a", "aa-bb-cc-dd-ee-ff")]);
        let store = InMemoryRecordStore::new();
        let policy = ClassificationPolicy::default();
        let tenant = tenant();
        let processor = ItemProcessor::new(&tenant, &source, &store, &policy);

        let (_queue, item) = first_item(&source);
        assert_eq!(processor.process(&item).await, ItemOutcome::Completed(UpsertAck::Inserted));

        let stored = store.records(&tenant);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].hardware_address.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[tokio::test]
    async fn invalid_address_fails_without_write() {
        let source = InMemoryDeviceSource::new(vec![detail("a", "aa:bb:cc:dd:ee")]);
        let store = InMemoryRecordStore::new();
        let policy = ClassificationPolicy::default();
        let tenant = tenant();
        let processor = ItemProcessor::new(&tenant, &source, &store, &policy);

        let (_queue, item) = first_item(&source);
        match processor.process(&item).await {
            ItemOutcome::Failed(err) => assert_eq!(err.class, ErrorClass::InvalidData),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(store.upsert_calls(), 0);
        assert_eq!(source.detail_calls(), 1);
    }

    #[tokio::test]
    async fn not_found_is_permanent() {
        let source = InMemoryDeviceSource::new(vec![detail("a", "aabbccddeeff")]);
        source.fail_detail(
            &DeviceId::new("a").unwrap(),
            vec![SourceError::NotFound("a".into())],
        );
        let store = InMemoryRecordStore::new();
        let policy = ClassificationPolicy::default();
        let tenant = tenant();
        let processor = ItemProcessor::new(&tenant, &source, &store, &policy);

        let (_queue, item) = first_item(&source);
        assert!(matches!(
            processor.process(&item).await,
            ItemOutcome::Failed(ItemError { class: ErrorClass::DeviceNotFound, .. })
        ));
    }

    #[tokio::test]
    async fn store_outage_is_retryable() {
        let source = InMemoryDeviceSource::new(vec![detail("a", "aabbccddeeff")]);
        let store = InMemoryRecordStore::new();
        store.fail_upsert(
            &DeviceId::new("a").unwrap(),
            vec![StoreError::Unavailable("connection reset".into())],
        );
        let policy = ClassificationPolicy::default();
        let tenant = tenant();
        let processor = ItemProcessor::new(&tenant, &source, &store, &policy);

        let (_queue, item) = first_item(&source);
        assert!(matches!(
            processor.process(&item).await,
            ItemOutcome::Retryable(ItemError { class: ErrorClass::StoreUnavailable, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out_as_transient() {
        let source = InMemoryDeviceSource::new(vec![detail("a", "aabbccddeeff")])
            .with_detail_latency(Duration::from_secs(5));
        let store = InMemoryRecordStore::new();
        let policy = ClassificationPolicy::default();
        let tenant = tenant();
        let processor = ItemProcessor::new(&tenant, &source, &store, &policy)
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(1));

        let (_queue, item) = first_item(&source);
        assert!(matches!(
            processor.process(&item).await,
            ItemOutcome::Retryable(ItemError { class: ErrorClass::Timeout, .. })
        ));
        assert_eq!(store.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn repeated_auth_failure_escalates() {
        let source = InMemoryDeviceSource::new(vec![detail("a", "aabbccddeeff")]);
        let id = DeviceId::new("a").unwrap();
        source.fail_detail(
            &id,
            vec![
                SourceError::Unauthorized("401".into()),
                SourceError::Unauthorized("401".into()),
            ],
        );
        let store = InMemoryRecordStore::new();
        let policy = ClassificationPolicy::default();
        let tenant = tenant();
        let processor = ItemProcessor::new(&tenant, &source, &store, &policy);

        let (mut queue, item) = first_item(&source);
        let ItemOutcome::Retryable(err) = processor.process(&item).await else {
            panic!("first auth failure should be retried");
        };
        queue.mark_retryable(item, err);

        let item = queue.dequeue_next().unwrap();
        assert!(matches!(
            processor.process(&item).await,
            ItemOutcome::Failed(ItemError { class: ErrorClass::AuthFailure, .. })
        ));
    }
}
