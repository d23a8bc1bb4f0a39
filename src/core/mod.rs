//! Core functionality for the safety band monitor
//! This module contains everything that does not depend on a concrete
//! platform: the telemetry codec, safety status, Bluetooth state machine,
//! escalation, location streaming and ordered store writes.

pub mod bluetooth;
pub mod escalation;
pub mod location;
pub mod monitor;
pub mod ports;
pub mod safety;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use bluetooth::{BleBackend, BluetoothManager};
pub use monitor::{Monitor, MonitorCommand, MonitorHandle};
pub use safety::{SafetyAggregator, SafetyStatus};
