//! Summary reporting through the tracing pipeline.

use tracing::{debug, info, warn};

use fleetsync_pipeline::{RunSummary, SummaryReporter, UpsertAck};

/// Logs one `info!` event per run and one `warn!` per failed device.
/// The full summary is emitted as JSON at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct AckTally {
    inserted: usize,
    updated: usize,
    unchanged: usize,
}

impl AckTally {
    fn of(summary: &RunSummary) -> Self {
        summary
            .completed()
            .iter()
            .fold(Self::default(), |mut tally, device| {
                match device.ack {
                    UpsertAck::Inserted => tally.inserted += 1,
                    UpsertAck::Updated => tally.updated += 1,
                    UpsertAck::Unchanged => tally.unchanged += 1,
                }
                tally
            })
    }
}

impl SummaryReporter for TracingReporter {
    fn report(&self, summary: &RunSummary) {
        let tally = AckTally::of(summary);
        let elapsed_ms = (summary.finished_at() - summary.started_at()).num_milliseconds();

        info!(
            run_id = %summary.run_id(),
            tenant_id = %summary.tenant_id(),
            total = summary.total(),
            completed = summary.completed_count(),
            failed = summary.failed_count(),
            inserted = tally.inserted,
            updated = tally.updated,
            unchanged = tally.unchanged,
            skipped = summary.skipped_entries(),
            duplicates = summary.duplicate_entries(),
            elapsed_ms,
            "run summary"
        );

        for failure in summary.failed() {
            warn!(
                run_id = %summary.run_id(),
                device_id = %failure.device_id,
                class = %failure.class,
                attempts = failure.attempts,
                error = %failure.message,
                "device not reconciled"
            );
        }

        match serde_json::to_string(summary) {
            Ok(json) => debug!(summary = %json, "run summary detail"),
            Err(e) => warn!(error = %e, "run summary could not be serialized"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsync_core::{DeviceDetail, DeviceId, TenantId};
    use fleetsync_pipeline::memory::{InMemoryDeviceSource, InMemoryRecordStore};
    use fleetsync_pipeline::{RetryPolicy, RunConfig, RunController, SourceError};

    fn detail(id: &str, mac: &str) -> DeviceDetail {
        DeviceDetail {
            device_id: Some(id.to_string()),
            serial_number: Some(format!("SN-{id}")),
            hardware_address_raw: Some(mac.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn tallies_acks_and_reports_failures() {
        let tenant = TenantId::new("c01fleet").unwrap();
        let source = InMemoryDeviceSource::new(vec![
            detail("a", "aabbccddee01"),
            detail("b", "aabbccddee02"),
            detail("c", "aabbccddee03"),
        ]);
        source.fail_detail(
            &DeviceId::new("c").unwrap(),
            vec![SourceError::NotFound("c".into())],
        );
        let config = RunConfig::new(tenant, "env:T", "devices").with_retry(RetryPolicy::immediate(2));
        let summary = RunController::new(config, source, InMemoryRecordStore::new())
            .run()
            .await
            .unwrap();

        assert_eq!(
            AckTally::of(&summary),
            AckTally {
                inserted: 2,
                updated: 0,
                unchanged: 0
            }
        );
        TracingReporter.report(&summary);
    }
}
