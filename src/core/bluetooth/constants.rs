//! Constants used by the Bluetooth side of the monitor
//! UUIDs of the safety band's GATT profile and operation timeouts.

use uuid::Uuid;

/// Service advertised by the safety band, also used as the scan filter
pub const UUID_TELEMETRY_SERVICE: Uuid = Uuid::from_u128(0x4fafc201_1fb5_459e_8fcc_c5c9c331914b);

/// Notify characteristic carrying the 3-byte telemetry frame
pub const UUID_TELEMETRY_CHAR: Uuid = Uuid::from_u128(0xbeb5483e_36e1_4688_b7f5_ea07361b26a8);

/// Default timeout for each connect/discover/subscribe step in seconds
pub const BLUETOOTH_OPERATION_TIMEOUT_SECS: u64 = 10;
