use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::core::bluetooth::{
    BLUETOOTH_OPERATION_TIMEOUT_SECS, UUID_TELEMETRY_CHAR, UUID_TELEMETRY_SERVICE,
};

/// Which band to look for and how long each setup step may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Service advertised by the band; also the scan filter
    pub service_uuid: Uuid,
    /// Characteristic carrying the 3-byte telemetry frame
    pub characteristic_uuid: Uuid,
    pub connect_timeout_secs: u64,
    pub discover_timeout_secs: u64,
    pub subscribe_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            service_uuid: UUID_TELEMETRY_SERVICE,
            characteristic_uuid: UUID_TELEMETRY_CHAR,
            connect_timeout_secs: BLUETOOTH_OPERATION_TIMEOUT_SECS,
            discover_timeout_secs: BLUETOOTH_OPERATION_TIMEOUT_SECS,
            subscribe_timeout_secs: BLUETOOTH_OPERATION_TIMEOUT_SECS,
        }
    }
}

impl DeviceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn discover_timeout(&self) -> Duration {
        Duration::from_secs(self.discover_timeout_secs)
    }

    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_secs(self.subscribe_timeout_secs)
    }
}
