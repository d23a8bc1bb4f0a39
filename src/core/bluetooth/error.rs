use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Setup step a Bluetooth error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SetupStep {
    AdapterWatch,
    Scan,
    Connect,
    Discover,
    Subscribe,
    Notify,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::AdapterWatch => "adapter watch",
            Self::Scan => "scan",
            Self::Connect => "connect",
            Self::Discover => "service discovery",
            Self::Subscribe => "subscribe",
            Self::Notify => "notification",
        };
        f.write_str(step)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BleError {
    #[error("No Bluetooth adapter found")]
    NoAdapter,
    #[error("Bluetooth adapter stopped reporting its state")]
    AdapterWatchEnded,
    #[error("Bluetooth {step} failed ({kind}): {message}")]
    Platform {
        step: SetupStep,
        kind: String,
        message: String,
    },
    #[error("Bluetooth {step} timed out after {after:?}")]
    Timeout { step: SetupStep, after: Duration },
    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),
    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),
    #[error("Notification stream ended")]
    NotificationsEnded,
}

impl BleError {
    pub fn platform(step: SetupStep, error: bluest::Error) -> Self {
        Self::Platform {
            step,
            kind: format!("{:?}", error.kind()),
            message: error.to_string(),
        }
    }

    /// Short error code, used as the alert title
    pub fn code(&self) -> &str {
        match self {
            Self::NoAdapter => "NoAdapter",
            Self::AdapterWatchEnded => "AdapterUnavailable",
            Self::Platform { kind, .. } => kind,
            Self::Timeout { .. } => "Timeout",
            Self::ServiceNotFound(_) => "ServiceNotFound",
            Self::CharacteristicNotFound(_) => "CharacteristicNotFound",
            Self::NotificationsEnded => "Disconnected",
        }
    }

    pub fn alert_title(&self) -> String {
        format!("Bluetooth connection error {}", self.code())
    }
}
