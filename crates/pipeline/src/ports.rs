//! Boundaries to the external collaborators.
//!
//! The pipeline only sees these traits; concrete adapters (HTTP device
//! source, Postgres record store, parameter store) live in `fleetsync-infra`,
//! in-memory ones in [`crate::memory`].

use std::sync::Arc;

use fleetsync_core::{DeviceDetail, DeviceId, DeviceRecord, DeviceReference, TenantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RunConfig;
use crate::controller::RunError;
use crate::summary::RunSummary;

/// Device source failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Transport failure, 5xx, rate limiting.
    #[error("device source unavailable: {0}")]
    Unavailable(String),
    /// The call did not answer within its deadline.
    #[error("device source timed out: {0}")]
    Timeout(String),
    /// Credentials rejected.
    #[error("device source rejected credentials: {0}")]
    Unauthorized(String),
    /// Device (or other addressed resource) does not exist; 4xx-style.
    #[error("device not found: {0}")]
    NotFound(String),
    /// Response could not be decoded.
    #[error("malformed device source response: {0}")]
    Malformed(String),
    #[error("device source error: {0}")]
    Other(String),
}

/// Record store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Connection refused/reset, pool exhausted, server shutting down.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("record store timed out: {0}")]
    Timeout(String),
    #[error("record store rejected credentials: {0}")]
    Unauthorized(String),
    /// Integrity constraint other than the expected upsert conflict.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("record store error: {0}")]
    Other(String),
}

/// Configuration failure; always fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing configuration key: {0}")]
    Missing(String),
    #[error("invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },
    #[error("parameter store unavailable: {0}")]
    Unavailable(String),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of a successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertAck {
    Inserted,
    Updated,
    /// Stored row already matched; nothing was written.
    Unchanged,
}

/// Result of the listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceListing {
    pub devices: Vec<DeviceReference>,
    /// Entries the source returned but could not address (no device id).
    pub skipped: usize,
}

impl From<Vec<DeviceReference>> for DeviceListing {
    fn from(devices: Vec<DeviceReference>) -> Self {
        Self {
            devices,
            skipped: 0,
        }
    }
}

/// Loads run parameters for a tenant.
#[async_trait::async_trait]
pub trait ConfigResolver: Send + Sync {
    async fn resolve(&self, tenant_id: &TenantId) -> Result<RunConfig, ConfigError>;
}

/// Vendor device-management API.
#[async_trait::async_trait]
pub trait DeviceSource: Send + Sync {
    /// List every device registered under the tenant.
    async fn list_devices(&self, tenant_id: &TenantId) -> Result<DeviceListing, SourceError>;

    /// Fetch detail for one device.
    async fn get_device_detail(&self, device_id: &DeviceId) -> Result<DeviceDetail, SourceError>;
}

/// Durable device table keyed on `(tenant_id, device_id)`.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
    ) -> Result<Option<DeviceRecord>, StoreError>;

    /// Insert or update; never duplicates a key.
    async fn upsert(&self, record: &DeviceRecord) -> Result<UpsertAck, StoreError>;
}

/// Builds the live adapters once the run configuration is known.
#[async_trait::async_trait]
pub trait AdapterFactory: Send + Sync {
    type Source: DeviceSource;
    type Store: RecordStore;

    async fn build(&self, config: &RunConfig) -> Result<(Self::Source, Self::Store), RunError>;
}

/// Receives the finished summary of a run.
pub trait SummaryReporter: Send + Sync {
    fn report(&self, summary: &RunSummary);
}

#[async_trait::async_trait]
impl<S> DeviceSource for Arc<S>
where
    S: DeviceSource + ?Sized,
{
    async fn list_devices(&self, tenant_id: &TenantId) -> Result<DeviceListing, SourceError> {
        (**self).list_devices(tenant_id).await
    }

    async fn get_device_detail(&self, device_id: &DeviceId) -> Result<DeviceDetail, SourceError> {
        (**self).get_device_detail(device_id).await
    }
}

#[async_trait::async_trait]
impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    async fn get(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
    ) -> Result<Option<DeviceRecord>, StoreError> {
        (**self).get(tenant_id, device_id).await
    }

    async fn upsert(&self, record: &DeviceRecord) -> Result<UpsertAck, StoreError> {
        (**self).upsert(record).await
    }
}
