//! Run controller: seed the queue from the listing, drain it, summarize.

use std::collections::HashSet;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use fleetsync_core::TenantId;

use crate::config::RunConfig;
use crate::ports::{
    AdapterFactory, ConfigError, ConfigResolver, DeviceSource, RecordStore, SourceError,
};
use crate::processor::{ItemOutcome, ItemProcessor};
use crate::queue::{ItemStatus, WorkQueue};
use crate::summary::{RunId, RunSummary};

/// Fatal run outcome. Item-level failures never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    /// The listing call failed; nothing was processed.
    #[error("device listing failed: {0}")]
    Listing(#[source] SourceError),
    /// Adapters could not be built from the resolved configuration.
    #[error("adapter setup failed: {0}")]
    Setup(String),
}

impl RunError {
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }
}

/// Orchestrates one reconciliation run for one tenant.
pub struct RunController<S, T> {
    config: RunConfig,
    source: S,
    store: T,
}

impl<S, T> RunController<S, T>
where
    S: DeviceSource,
    T: RecordStore,
{
    pub fn new(config: RunConfig, source: S, store: T) -> Self {
        Self {
            config,
            source,
            store,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// List, seed, drain, summarize.
    ///
    /// Only a failed listing aborts the run; every listed device ends up in
    /// the summary as completed or failed.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let tenant_id = &self.config.tenant_id;
        info!(%run_id, %tenant_id, "reconciliation run started");

        let listing = self
            .source
            .list_devices(tenant_id)
            .await
            .map_err(RunError::Listing)?;
        if listing.skipped > 0 {
            warn!(%run_id, skipped = listing.skipped, "listing entries without device id skipped");
        }

        let mut queue = WorkQueue::new(self.config.retry.clone());
        let mut seen = HashSet::new();
        let mut duplicates = 0usize;
        for reference in listing.devices {
            if seen.insert(reference.device_id.clone()) {
                queue.enqueue(reference);
            } else {
                duplicates += 1;
                warn!(device_id = %reference.device_id, "duplicate device in listing, skipped");
            }
        }
        info!(%run_id, devices = seen.len(), "queue seeded");

        let processor = ItemProcessor::new(
            tenant_id,
            &self.source,
            &self.store,
            &self.config.classification,
        )
        .with_timeouts(self.config.api_timeout, self.config.store_timeout);

        let mut pass = 1u32;
        while let Some(item) = queue.dequeue_next() {
            if item.attempt_count() > pass {
                pass = item.attempt_count();
                let delay = self.config.retry.delay_for_pass(pass - 1);
                info!(%run_id, pass, remaining = queue.pending_len() + 1, ?delay, "starting retry pass");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let device_id = item.device_id().clone();
            match processor.process(&item).await {
                ItemOutcome::Completed(ack) => {
                    debug!(%device_id, ?ack, "device completed");
                    queue.complete(item, ack);
                }
                ItemOutcome::Retryable(error) => {
                    let class = error.class;
                    let attempt = item.attempt_count();
                    match queue.mark_retryable(item, error) {
                        ItemStatus::Failed => {
                            warn!(%device_id, %class, attempt, "device failed, attempts exhausted")
                        }
                        _ => debug!(%device_id, %class, attempt, "device will be retried"),
                    }
                }
                ItemOutcome::Failed(error) => {
                    warn!(%device_id, class = %error.class, error = %error.message, "device failed");
                    queue.mark_failed(item, error);
                }
            }
        }

        let summary =
            RunSummary::from_archive(run_id, tenant_id.clone(), started_at, queue.into_archive())
                .with_listing_counts(listing.skipped, duplicates);
        info!(
            %run_id,
            total = summary.total(),
            completed = summary.completed_count(),
            failed = summary.failed_count(),
            skipped = summary.skipped_entries(),
            "reconciliation run finished"
        );
        Ok(summary)
    }
}

/// Resolve configuration, build adapters, and run once.
///
/// Configuration and setup failures abort before any device is touched.
pub async fn reconcile<R, F>(
    resolver: &R,
    factory: &F,
    tenant_id: &TenantId,
) -> Result<RunSummary, RunError>
where
    R: ConfigResolver + ?Sized,
    F: AdapterFactory + ?Sized,
{
    let config = resolver.resolve(tenant_id).await?;
    debug!(%tenant_id, table = %config.target_table, "configuration resolved");

    let (source, store) = factory.build(&config).await?;
    RunController::new(config, source, store).run().await
}
