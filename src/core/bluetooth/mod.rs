//! Bluetooth functionality for the safety band
//! This module handles watching the adapter, scanning for the band,
//! connecting to it and receiving its telemetry notifications.

mod backend;
mod connection;
mod constants;
mod error;
mod manager;
mod notification;
mod platform;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use backend::{AdapterStateStream, BleBackend, NotificationStream, ScanStream, receiver_stream};
pub use connection::{BandConnection, ConnectionManager};
pub use constants::*; // Re-export all constants
pub use error::{BleError, SetupStep};
pub use manager::{BleEvent, BleSignal, BluetoothManager, CycleProgress};
pub use notification::NotificationHandler;
pub use platform::BluestBackend;
pub use scanner::BluetoothScanner;
pub use types::{AdapterState, BleStatus, ConnectionState, DiscoveredDevice, ScanState};
