//! Device attribute directory.
//!
//! Supplies a device's recorded device type, consulted at deployment
//! creation. The default implementation knows nothing; device types are
//! then resolved lazily from what the device reports at poll time.

use async_trait::async_trait;
use hangar_core::ids::{DeviceId, TenantId};

/// Looks up device attributes recorded by the device management service.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// The device type recorded for this device, if known.
    async fn device_type(&self, tenant: TenantId, device_id: &DeviceId) -> Option<String>;
}

/// Directory with no recorded attributes.
pub struct EmptyDirectory;

#[async_trait]
impl DeviceDirectory for EmptyDirectory {
    async fn device_type(&self, _tenant: TenantId, _device_id: &DeviceId) -> Option<String> {
        None
    }
}
