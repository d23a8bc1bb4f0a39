//! Integration test driver for `tests/integration/`.
//!
//! Each `mod` below maps to a file that exercises one part of the monitor
//! against mock collaborators. No Bluetooth hardware is required.

mod mock_ble;
mod session_tests;
