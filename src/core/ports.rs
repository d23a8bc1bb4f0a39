//! Port traits for the collaborators the monitor drives.
//!
//! ```text
//!   adapters::* ──▶ port trait ──▶ Monitor / LocationStreamer / EscalationCoordinator
//! ```
//!
//! The core only decides *when* to call these; what happens behind them
//! (a database, a terminal, a phone) is up to the implementation.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The signed-in wearer. The monitor never runs without one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: String,
}

impl UserSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

/// Backend store for the wearer's live status.
///
/// Calls are fire-and-forget from the monitor's point of view: errors are
/// logged and never retried.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Records whether the wearer's body temperature is currently safe.
    async fn update_user_status(&self, user_id: &str, is_safe: bool) -> Result<()>;

    /// Records the wearer's latest position.
    async fn update_user_gps(&self, user_id: &str, latitude: f64, longitude: f64) -> Result<()>;
}

/// Outcome of a location permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Requested fix quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accuracy {
    Balanced,
    High,
    Highest,
}

/// Subscription hints handed to the location provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub accuracy: Accuracy,
    /// Minimum time between samples, in milliseconds
    pub min_interval_ms: u64,
    /// Minimum displacement between samples, in meters
    pub min_distance_m: f64,
}

/// One position fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus>;

    /// Opens a position subscription. Dropping the stream cancels it.
    async fn watch_position(&self, options: WatchOptions) -> Result<BoxStream<'static, LocationSample>>;
}

/// Blocking dialogs shown to the wearer
#[async_trait]
pub trait AlertPrompter: Send + Sync {
    /// Asks a yes/no question. `Ok(true)` means yes.
    async fn confirm(&self, title: &str, message: &str) -> Result<bool>;

    /// Shows an informational alert.
    async fn alert(&self, title: &str, message: &str);
}

/// Error reported by a failed call attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct CallError {
    pub kind: String,
    pub message: String,
}

impl CallError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait Telephony: Send + Sync {
    /// Whether this device is able to place a call to `number` at all.
    async fn can_call(&self, number: &str) -> bool;

    async fn call(&self, number: &str) -> Result<(), CallError>;
}

/// Everything outside the core the monitor talks to
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn StatusStore>,
    pub prompter: Arc<dyn AlertPrompter>,
    pub telephony: Arc<dyn Telephony>,
    pub location: Arc<dyn LocationProvider>,
}
