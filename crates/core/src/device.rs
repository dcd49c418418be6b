//! Device shapes: what the listing returns, what the detail fetch returns,
//! and what gets persisted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::hardware_address::HardwareAddress;
use crate::id::{DeviceId, TenantId};

/// Reference to a device as returned by the listing call.
///
/// Detail fields are fetched lazily per device; the reference only carries
/// what the listing already knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceReference {
    pub device_id: DeviceId,
    pub serial_number: Option<String>,
}

impl DeviceReference {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            serial_number: None,
        }
    }
}

/// Per-device detail as returned by the device source, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDetail {
    /// Device id echoed by the source, if it reports one.
    pub device_id: Option<String>,
    pub serial_number: Option<String>,
    pub hardware_address_raw: Option<String>,
    pub model: Option<String>,
    pub status: Option<String>,
    pub last_sync: Option<NaiveDate>,
    pub org_unit_path: Option<String>,
}

/// The persisted unit: one row per `(tenant_id, device_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub tenant_id: TenantId,
    pub device_id: DeviceId,
    pub serial_number: String,
    pub hardware_address: HardwareAddress,
    pub model: Option<String>,
    pub status: Option<String>,
    pub last_sync: Option<NaiveDate>,
    pub org_unit_path: Option<String>,
}

impl DeviceRecord {
    /// Validate a fetched detail and build the record to persist.
    ///
    /// Fails when the serial number or hardware address is missing, when the
    /// address cannot be normalized, or when the source echoes a different
    /// device id than the one requested.
    pub fn from_detail(
        tenant_id: TenantId,
        device_id: DeviceId,
        detail: DeviceDetail,
    ) -> DomainResult<Self> {
        if let Some(echoed) = detail.device_id.as_deref() {
            if echoed.trim() != device_id.as_str() {
                return Err(DomainError::validation(format!(
                    "detail for {device_id} reported device id {echoed:?}"
                )));
            }
        }

        let serial_number = non_blank(detail.serial_number)
            .ok_or(DomainError::MissingField("serialNumber"))?;
        let raw = non_blank(detail.hardware_address_raw)
            .ok_or(DomainError::MissingField("macAddress"))?;
        let hardware_address = HardwareAddress::parse(&raw)?;

        Ok(Self {
            tenant_id,
            device_id,
            serial_number,
            hardware_address,
            model: non_blank(detail.model),
            status: non_blank(detail.status),
            last_sync: detail.last_sync,
            org_unit_path: non_blank(detail.org_unit_path),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("C01tenant").unwrap()
    }

    fn device() -> DeviceId {
        DeviceId::new("dev-1").unwrap()
    }

    fn detail() -> DeviceDetail {
        DeviceDetail {
            device_id: Some("dev-1".to_string()),
            serial_number: Some("SN123".to_string()),
            hardware_address_raw: Some("aa-bb-cc-dd-ee-ff".to_string()),
            model: Some("Chromebook 14".to_string()),
            status: Some("ACTIVE".to_string()),
            last_sync: NaiveDate::from_ymd_opt(2025, 3, 1),
            org_unit_path: Some(" ".to_string()),
        }
    }

    #[test]
    fn builds_normalized_record() {
        let record = DeviceRecord::from_detail(tenant(), device(), detail()).unwrap();
        assert_eq!(record.hardware_address.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(record.serial_number, "SN123");
        assert_eq!(record.model.as_deref(), Some("Chromebook 14"));
        assert_eq!(record.org_unit_path, None);
    }

    #[test]
    fn missing_address_is_rejected() {
        let mut d = detail();
        d.hardware_address_raw = Some("".to_string());
        let err = DeviceRecord::from_detail(tenant(), device(), d).unwrap_err();
        assert_eq!(err, DomainError::MissingField("macAddress"));
    }

    #[test]
    fn missing_serial_is_rejected() {
        let mut d = detail();
        d.serial_number = None;
        let err = DeviceRecord::from_detail(tenant(), device(), d).unwrap_err();
        assert_eq!(err, DomainError::MissingField("serialNumber"));
    }

    #[test]
    fn mismatched_echo_is_rejected() {
        let mut d = detail();
        d.device_id = Some("dev-2".to_string());
        assert!(matches!(
            DeviceRecord::from_detail(tenant(), device(), d),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn unparseable_address_is_rejected() {
        let mut d = detail();
        d.hardware_address_raw = Some("aa:bb:cc:dd:ee".to_string());
        assert!(matches!(
            DeviceRecord::from_detail(tenant(), device(), d),
            Err(DomainError::InvalidHardwareAddress(_))
        ));
    }
}
