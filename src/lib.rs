//! Safety band monitor library
//! Receives telemetry from a BLE safety wearable, keeps the wearer's safety
//! status, records it for their contacts and offers an emergency call when
//! the band reports a heart-rate or fall alarm.

// Module declarations
pub mod adapters;
pub mod config;
pub mod core;
pub mod logging;
pub mod state;
pub mod utils;
