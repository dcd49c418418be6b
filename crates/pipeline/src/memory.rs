//! In-memory adapters for tests/dev.
//!
//! Failures can be scripted per device; each scripted error is consumed by
//! one call, after which the adapter behaves normally again.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fleetsync_core::{DeviceDetail, DeviceId, DeviceRecord, DeviceReference, TenantId};

use crate::config::RunConfig;
use crate::ports::{
    ConfigError, ConfigResolver, DeviceListing, DeviceSource, RecordStore, SourceError, StoreError,
    SummaryReporter, UpsertAck,
};
use crate::summary::RunSummary;

/// Device source backed by a fixed list of details.
#[derive(Debug, Default)]
pub struct InMemoryDeviceSource {
    devices: Vec<(DeviceId, DeviceDetail)>,
    unaddressable: usize,
    list_failure: Option<SourceError>,
    detail_failures: Mutex<HashMap<DeviceId, VecDeque<SourceError>>>,
    detail_latency: Option<Duration>,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl InMemoryDeviceSource {
    /// Devices are listed in the given order. Details without a usable
    /// device id are reported as skipped listing entries.
    pub fn new(details: Vec<DeviceDetail>) -> Self {
        let total = details.len();
        let devices: Vec<_> = details
            .into_iter()
            .filter_map(|detail| {
                let id = DeviceId::new(detail.device_id.clone()?).ok()?;
                Some((id, detail))
            })
            .collect();
        Self {
            unaddressable: total - devices.len(),
            devices,
            ..Default::default()
        }
    }

    /// Make the listing call fail.
    pub fn with_list_failure(mut self, err: SourceError) -> Self {
        self.list_failure = Some(err);
        self
    }

    pub fn with_detail_latency(mut self, latency: Duration) -> Self {
        self.detail_latency = Some(latency);
        self
    }

    /// Queue errors returned by the next detail fetches of `device_id`.
    pub fn fail_detail(&self, device_id: &DeviceId, errors: Vec<SourceError>) {
        let mut failures = self.detail_failures.lock().unwrap();
        failures.entry(device_id.clone()).or_default().extend(errors);
    }

    pub fn references(&self) -> Vec<DeviceReference> {
        self.devices
            .iter()
            .map(|(id, detail)| DeviceReference {
                device_id: id.clone(),
                serial_number: detail.serial_number.clone(),
            })
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DeviceSource for InMemoryDeviceSource {
    async fn list_devices(&self, _tenant_id: &TenantId) -> Result<DeviceListing, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match &self.list_failure {
            Some(err) => Err(err.clone()),
            None => Ok(DeviceListing {
                devices: self.references(),
                skipped: self.unaddressable,
            }),
        }
    }

    async fn get_device_detail(&self, device_id: &DeviceId) -> Result<DeviceDetail, SourceError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.detail_latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = {
            let mut failures = self.detail_failures.lock().unwrap();
            failures.get_mut(device_id).and_then(VecDeque::pop_front)
        };
        if let Some(err) = scripted {
            return Err(err);
        }

        self.devices
            .iter()
            .find(|(id, _)| id == device_id)
            .map(|(_, detail)| detail.clone())
            .ok_or_else(|| SourceError::NotFound(device_id.to_string()))
    }
}

/// Record store keyed on `(tenant_id, device_id)`.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<(TenantId, DeviceId), DeviceRecord>>,
    upsert_failures: Mutex<HashMap<DeviceId, VecDeque<StoreError>>>,
    upsert_calls: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue errors returned by the next upserts of `device_id`.
    pub fn fail_upsert(&self, device_id: &DeviceId, errors: Vec<StoreError>) {
        let mut failures = self.upsert_failures.lock().unwrap();
        failures.entry(device_id.clone()).or_default().extend(errors);
    }

    /// All records for a tenant, ordered by device id.
    pub fn records(&self, tenant_id: &TenantId) -> Vec<DeviceRecord> {
        let records = self.records.lock().unwrap();
        let mut out: Vec<_> = records
            .iter()
            .filter(|((t, _), _)| t == tenant_id)
            .map(|(_, r)| r.clone())
            .collect();
        out.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        out
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
    ) -> Result<Option<DeviceRecord>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records.get(&(tenant_id.clone(), device_id.clone())).cloned())
    }

    async fn upsert(&self, record: &DeviceRecord) -> Result<UpsertAck, StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = {
            let mut failures = self.upsert_failures.lock().unwrap();
            failures.get_mut(&record.device_id).and_then(VecDeque::pop_front)
        };
        if let Some(err) = scripted {
            return Err(err);
        }

        let mut records = self.records.lock().unwrap();
        let key = (record.tenant_id.clone(), record.device_id.clone());
        let ack = match records.get(&key) {
            None => UpsertAck::Inserted,
            Some(existing) if existing == record => return Ok(UpsertAck::Unchanged),
            Some(_) => UpsertAck::Updated,
        };
        records.insert(key, record.clone());
        Ok(ack)
    }
}

/// Resolver over a fixed set of tenant configurations.
#[derive(Debug, Default)]
pub struct StaticConfigResolver {
    configs: HashMap<TenantId, RunConfig>,
}

impl StaticConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, config: RunConfig) -> Self {
        self.configs.insert(config.tenant_id.clone(), config);
        self
    }
}

#[async_trait::async_trait]
impl ConfigResolver for StaticConfigResolver {
    async fn resolve(&self, tenant_id: &TenantId) -> Result<RunConfig, ConfigError> {
        let config = self
            .configs
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| ConfigError::Missing(format!("tenants.{tenant_id}")))?;

        if config.api_credentials_ref.trim().is_empty() {
            return Err(ConfigError::Missing(format!("tenants.{tenant_id}.api_credentials_ref")));
        }
        if config.target_table.trim().is_empty() {
            return Err(ConfigError::Missing(format!("tenants.{tenant_id}.target_table")));
        }
        Ok(config)
    }
}

/// Reporter that keeps every summary it receives.
#[derive(Debug, Default)]
pub struct InMemoryReporter {
    inner: Mutex<Vec<RunSummary>>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<RunSummary> {
        self.inner.lock().unwrap().clone()
    }
}

impl SummaryReporter for InMemoryReporter {
    fn report(&self, summary: &RunSummary) {
        self.inner.lock().unwrap().push(summary.clone());
    }
}
