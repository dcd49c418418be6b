//! Aggregate outcome of one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fleetsync_core::{DeviceId, TenantId};

use crate::classify::ErrorClass;
use crate::ports::UpsertAck;
use crate::queue::{Archive, ItemStatus};

/// Unique run identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedDevice {
    pub device_id: DeviceId,
    pub attempts: u32,
    pub ack: UpsertAck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDevice {
    pub device_id: DeviceId,
    pub class: ErrorClass,
    pub message: String,
    pub attempts: u32,
}

/// Immutable report of a finished run: every listed device appears exactly
/// once, either completed or failed.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    run_id: RunId,
    tenant_id: TenantId,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    total: usize,
    completed_count: usize,
    failed_count: usize,
    /// Listing entries without a usable device id; never queued.
    skipped_entries: usize,
    /// Repeated listing entries for a device already queued.
    duplicate_entries: usize,
    completed: Vec<CompletedDevice>,
    failed: Vec<FailedDevice>,
}

impl RunSummary {
    pub(crate) fn from_archive(
        run_id: RunId,
        tenant_id: TenantId,
        started_at: DateTime<Utc>,
        archive: Archive,
    ) -> Self {
        let completed: Vec<CompletedDevice> = archive
            .completed
            .into_iter()
            .map(|item| CompletedDevice {
                attempts: item.attempt_count(),
                ack: item.ack().unwrap_or(UpsertAck::Unchanged),
                device_id: item.payload.device_id,
            })
            .collect();

        let failed: Vec<FailedDevice> = archive
            .failed
            .into_iter()
            .map(|item| {
                let (class, message) = match item.last_error {
                    Some(err) => (err.class, err.message),
                    None => (ErrorClass::Unclassified, String::new()),
                };
                FailedDevice {
                    attempts: item.attempt_count,
                    device_id: item.payload.device_id,
                    class,
                    message,
                }
            })
            .collect();

        Self {
            run_id,
            tenant_id,
            started_at,
            finished_at: Utc::now(),
            total: completed.len() + failed.len(),
            completed_count: completed.len(),
            failed_count: failed.len(),
            skipped_entries: 0,
            duplicate_entries: 0,
            completed,
            failed,
        }
    }

    pub(crate) fn with_listing_counts(mut self, skipped: usize, duplicates: usize) -> Self {
        self.skipped_entries = skipped;
        self.duplicate_entries = duplicates;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn skipped_entries(&self) -> usize {
        self.skipped_entries
    }

    pub fn duplicate_entries(&self) -> usize {
        self.duplicate_entries
    }

    pub fn completed(&self) -> &[CompletedDevice] {
        &self.completed
    }

    pub fn failed(&self) -> &[FailedDevice] {
        &self.failed
    }

    /// `(device_id, class)` for every failed device.
    pub fn failures(&self) -> impl Iterator<Item = (&DeviceId, ErrorClass)> {
        self.failed.iter().map(|f| (&f.device_id, f.class))
    }

    /// Terminal status of a device, if it was part of the run.
    pub fn status_of(&self, device_id: &DeviceId) -> Option<ItemStatus> {
        if self.completed.iter().any(|c| &c.device_id == device_id) {
            Some(ItemStatus::Completed)
        } else if self.failed.iter().any(|f| &f.device_id == device_id) {
            Some(ItemStatus::Failed)
        } else {
            None
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
