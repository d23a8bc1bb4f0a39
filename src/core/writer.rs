//! Ordered store writes
//! One long-lived task per writer applies updates to the [`StatusStore`] in
//! the order they were queued. Callers never wait on the store.

use std::sync::Arc;

use log::{debug, error};
use tokio::sync::mpsc;

use crate::core::ports::StatusStore;

#[derive(Debug, Clone, Copy, PartialEq)]
enum StoreUpdate {
    Status(bool),
    Gps { latitude: f64, longitude: f64 },
}

/// Queues store updates for one user.
///
/// Dropping the writer closes the queue; updates already queued are still
/// written before the task exits.
pub struct StoreWriter {
    updates: mpsc::UnboundedSender<StoreUpdate>,
}

impl StoreWriter {
    pub fn spawn(store: Arc<dyn StatusStore>, user_id: String) -> Self {
        let (updates, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::drain(store, user_id, rx));
        Self { updates }
    }

    pub fn status(&self, is_safe: bool) {
        self.queue(StoreUpdate::Status(is_safe));
    }

    pub fn gps(&self, latitude: f64, longitude: f64) {
        self.queue(StoreUpdate::Gps { latitude, longitude });
    }

    fn queue(&self, update: StoreUpdate) {
        if self.updates.send(update).is_err() {
            error!("Store writer has stopped; dropping {:?}.", update);
        }
    }

    async fn drain(
        store: Arc<dyn StatusStore>,
        user_id: String,
        mut updates: mpsc::UnboundedReceiver<StoreUpdate>,
    ) {
        while let Some(update) = updates.recv().await {
            let result = match update {
                StoreUpdate::Status(is_safe) => store.update_user_status(&user_id, is_safe).await,
                StoreUpdate::Gps { latitude, longitude } => {
                    store.update_user_gps(&user_id, latitude, longitude).await
                }
            };
            if let Err(e) = result {
                error!("Failed to store {:?} for {}: {:#}", update, user_id, e);
            }
        }
        debug!("Store writer for {} closed.", user_id);
    }
}
