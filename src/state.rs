//! Application state management
//! This module defines the state that lives for as long as a wearer is
//! signed in: the safety monitor and the location streamer.

use std::sync::Arc;

use log::info;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::core::bluetooth::{BleBackend, BleStatus};
use crate::core::location::LocationStreamer;
use crate::core::monitor::{Monitor, MonitorHandle};
use crate::core::ports::{Collaborators, UserSession};
use crate::core::safety::SafetyStatus;

/// Session-scoped application state
pub struct AppState {
    pub session: UserSession,
    monitor: MonitorHandle,
    location: LocationStreamer,
}

impl AppState {
    /// Starts monitoring and location streaming for `session`.
    pub fn start<B: BleBackend>(
        session: UserSession,
        config: &AppConfig,
        backend: Arc<B>,
        collaborators: Collaborators,
    ) -> Self {
        info!("Starting session for user {}.", session.user_id);

        let monitor = Monitor::new(session.clone(), backend, config, &collaborators).spawn();

        let mut location = LocationStreamer::new(
            collaborators.location.clone(),
            collaborators.store.clone(),
            config.location.watch_options(),
        );
        location.start(&session);

        Self {
            session,
            monitor,
            location,
        }
    }

    pub fn safety(&self) -> watch::Receiver<SafetyStatus> {
        self.monitor.safety()
    }

    pub fn ble_status(&self) -> watch::Receiver<BleStatus> {
        self.monitor.ble_status()
    }

    pub fn dialog_open(&self) -> watch::Receiver<bool> {
        self.monitor.dialog_open()
    }

    pub fn last_payload(&self) -> watch::Receiver<Option<Vec<u8>>> {
        self.monitor.last_payload()
    }

    pub fn is_streaming_location(&self) -> bool {
        self.location.is_running()
    }

    pub fn retry_bluetooth(&self) -> bool {
        self.monitor.retry_bluetooth()
    }

    /// Ends the session. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.location.stop().await;
        self.monitor.shutdown().await;
        info!("Session for user {} ended.", self.session.user_id);
    }
}
