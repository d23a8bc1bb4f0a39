//! Defines shared data structures for the Bluetooth module.

use serde::Serialize;
use std::fmt;

/// Power state of the local adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AdapterState {
    #[default]
    Unknown,
    PoweredOff,
    PoweredOn,
}

/// Discovery progress of the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
    DeviceFound,
}

/// Link progress of the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    ServiceDiscovery,
    Subscribed,
    /// A step failed. Stays here until retried or torn down.
    Failed,
}

/// Coarse label shown to the wearer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BleStatus {
    Loading,
    On,
    #[default]
    Off,
}

impl fmt::Display for BleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Loading => "loading",
            Self::On => "on",
            Self::Off => "off",
        };
        f.write_str(label)
    }
}

/// Represents a discovered safety band
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    /// Platform-specific unique identifier
    pub id: String,
    /// Advertised name, if available
    pub name: Option<String>,
    /// MAC address when the platform id carries one
    pub address: Option<String>,
}
