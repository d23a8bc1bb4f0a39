//! Safety state aggregation
//! Holds the most recent flags reported by the band and derives the overall
//! safe/unsafe status from them.

use log::info;
use serde::Serialize;

use crate::core::telemetry::TelemetryFrame;

/// Current safety flags of the wearer.
///
/// Defaults to all-ok until the first frame arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetyStatus {
    pub temperature_ok: bool,
    pub heart_rate_ok: bool,
    pub fall_ok: bool,
}

impl Default for SafetyStatus {
    fn default() -> Self {
        Self {
            temperature_ok: true,
            heart_rate_ok: true,
            fall_ok: true,
        }
    }
}

impl SafetyStatus {
    /// True only when every flag is ok
    pub fn is_safe(&self) -> bool {
        self.temperature_ok && self.heart_rate_ok && self.fall_ok
    }

    /// Heart-rate or fall trouble. Temperature alone is recorded, not escalated.
    pub fn requires_escalation(&self) -> bool {
        !self.heart_rate_ok || !self.fall_ok
    }
}

impl From<TelemetryFrame> for SafetyStatus {
    fn from(frame: TelemetryFrame) -> Self {
        Self {
            temperature_ok: frame.temperature_ok,
            heart_rate_ok: frame.heart_rate_ok,
            fall_ok: frame.fall_ok,
        }
    }
}

/// Result of applying one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyUpdate {
    pub status: SafetyStatus,
    /// The temperature flag differs from the previous frame
    pub temperature_changed: bool,
}

/// Keeps the latest safety flags
#[derive(Debug, Default)]
pub struct SafetyAggregator {
    status: SafetyStatus,
}

impl SafetyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites all three flags with the frame's values.
    pub fn update(&mut self, frame: TelemetryFrame) -> SafetyUpdate {
        let previous = self.status;
        self.status = SafetyStatus::from(frame);

        if previous.is_safe() != self.status.is_safe() {
            info!(
                "Safety status changed: {} (temperature: {}, heart rate: {}, fall: {})",
                if self.status.is_safe() { "safe" } else { "UNSAFE" },
                self.status.temperature_ok,
                self.status.heart_rate_ok,
                self.status.fall_ok
            );
        }

        SafetyUpdate {
            status: self.status,
            temperature_changed: previous.temperature_ok != self.status.temperature_ok,
        }
    }

    pub fn status(&self) -> SafetyStatus {
        self.status
    }

    pub fn is_safe(&self) -> bool {
        self.status.is_safe()
    }
}
