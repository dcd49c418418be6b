//! `fleetsync-core` — domain primitives for device inventory reconciliation.
//!
//! This crate contains **pure domain** types (no I/O): identifiers, the
//! canonical hardware address, and the device shapes that flow from the
//! device source into the record store.

pub mod device;
pub mod error;
pub mod hardware_address;
pub mod id;
pub mod value_object;

pub use device::{DeviceDetail, DeviceRecord, DeviceReference};
pub use error::{DomainError, DomainResult};
pub use hardware_address::HardwareAddress;
pub use id::{DeviceId, TenantId};
pub use value_object::ValueObject;
