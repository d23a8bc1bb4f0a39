//! Platform adapters for the companion binary
//! Implementations of the port traits in [`crate::core::ports`] for a Linux
//! host: a JSON file store, gpsd, the terminal and an external dial command.

pub mod console;
pub mod dialer;
pub mod gpsd;
pub mod store;

pub use console::ConsolePrompter;
pub use dialer::CommandDialer;
pub use gpsd::GpsdLocationProvider;
pub use store::{FileStatusStore, StatusSnapshot};
