use serde::{Deserialize, Serialize};

use crate::core::ports::{Accuracy, WatchOptions};

/// Location streaming settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// The wearer's consent to share their position. Acts as the
    /// foreground location permission.
    pub share_location: bool,
    /// gpsd endpoint, `host:port`
    pub gpsd_address: String,
    pub accuracy: Accuracy,
    /// Minimum time between forwarded samples (ms)
    pub min_interval_ms: u64,
    /// Minimum displacement between forwarded samples (m)
    pub min_distance_m: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        LocationConfig {
            share_location: true,
            gpsd_address: "127.0.0.1:2947".to_string(),
            accuracy: Accuracy::Highest,
            min_interval_ms: 1000,
            min_distance_m: 1.0,
        }
    }
}

impl LocationConfig {
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            accuracy: self.accuracy,
            min_interval_ms: self.min_interval_ms,
            min_distance_m: self.min_distance_m,
        }
    }
}
