//! Location streaming
//! Forwards the wearer's position to the status store for as long as a
//! session is active. Runs independently of the Bluetooth side.

use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::ports::{
    LocationProvider, LocationSample, PermissionStatus, StatusStore, UserSession, WatchOptions,
};
use crate::core::writer::StoreWriter;

/// How a streaming task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Permission was denied; nothing was subscribed
    PermissionDenied,
    /// The provider could not be asked or could not subscribe
    ProviderError,
    /// `stop()` was called
    Cancelled,
    /// The provider closed the subscription
    Exhausted,
}

pub struct LocationStreamer {
    provider: Arc<dyn LocationProvider>,
    store: Arc<dyn StatusStore>,
    options: WatchOptions,
    cancel_token: CancellationToken,
    task_handle: Option<JoinHandle<StreamEnd>>,
}

impl LocationStreamer {
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        store: Arc<dyn StatusStore>,
        options: WatchOptions,
    ) -> Self {
        Self {
            provider,
            store,
            options,
            cancel_token: CancellationToken::new(),
            task_handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Starts streaming for `session`. Returns `false` if already running.
    pub fn start(&mut self, session: &UserSession) -> bool {
        if self.is_running() {
            debug!("Location streaming already active.");
            return false;
        }

        self.cancel_token = CancellationToken::new();
        let handle = tokio::spawn(Self::stream_task(
            self.provider.clone(),
            self.store.clone(),
            self.options,
            session.user_id.clone(),
            self.cancel_token.clone(),
        ));
        self.task_handle = Some(handle);
        true
    }

    /// Cancels the subscription and waits for the task. Safe to call when
    /// nothing is running. Returns how the task ended, if there was one.
    pub async fn stop(&mut self) -> Option<StreamEnd> {
        self.cancel_token.cancel();

        let handle = self.task_handle.take()?;
        match handle.await {
            Ok(end) => {
                info!("Location streaming stopped ({:?}).", end);
                Some(end)
            }
            Err(e) => {
                error!("Location task finished with a join error: {:?}", e);
                None
            }
        }
    }

    async fn stream_task(
        provider: Arc<dyn LocationProvider>,
        store: Arc<dyn StatusStore>,
        options: WatchOptions,
        user_id: String,
        cancel_token: CancellationToken,
    ) -> StreamEnd {
        let permission = tokio::select! {
            _ = cancel_token.cancelled() => return StreamEnd::Cancelled,
            permission = provider.request_foreground_permission() => permission,
        };

        match permission {
            Ok(PermissionStatus::Granted) => {}
            Ok(PermissionStatus::Denied) => {
                warn!("Location permission denied, not sharing location.");
                return StreamEnd::PermissionDenied;
            }
            Err(e) => {
                error!("Failed to request location permission: {}", e);
                return StreamEnd::ProviderError;
            }
        }

        let subscription = tokio::select! {
            _ = cancel_token.cancelled() => return StreamEnd::Cancelled,
            subscription = provider.watch_position(options) => subscription,
        };
        let mut samples = match subscription {
            Ok(samples) => samples,
            Err(e) => {
                error!("Failed to subscribe to location updates: {}", e);
                return StreamEnd::ProviderError;
            }
        };
        info!("Location streaming started ({:?}).", options);

        let writer = StoreWriter::spawn(store, user_id);
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => return StreamEnd::Cancelled,
                sample = samples.next() => match sample {
                    Some(sample) => Self::forward(&writer, sample),
                    None => {
                        warn!("Location subscription ended by the provider.");
                        return StreamEnd::Exhausted;
                    }
                },
            }
        }
    }

    fn forward(writer: &StoreWriter, sample: LocationSample) {
        debug!(
            "Location sample at {}: {}, {}",
            sample.timestamp, sample.latitude, sample.longitude
        );
        writer.gps(sample.latitude, sample.longitude);
    }
}
