//! Notification handling for the safety band
//! Subscribes to the telemetry characteristic and hands its values out as
//! an owned stream.

use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::core::bluetooth::backend::{NotificationStream, receiver_stream};
use crate::core::bluetooth::error::{BleError, SetupStep};

/// Notification handler for telemetry data
pub struct NotificationHandler;

impl NotificationHandler {
    /// Subscribes to `notify_char`. The subscription lives in a task that
    /// stops when the returned stream is dropped.
    pub async fn subscribe(notify_char: Characteristic) -> Result<NotificationStream, BleError> {
        info!("Subscribing to notifications...");
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let mut notification_stream = match notify_char.notify().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(BleError::platform(SetupStep::Subscribe, e)));
                    return;
                }
            };

            info!("Listening for band notifications...");
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    result = notification_stream.next() => match result {
                        Some(Ok(value)) => {
                            debug!("Received band data: {:?}", value);
                            if tx.send(Ok(value)).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!("Error in notification stream: {}", e);
                            let _ = tx.send(Err(BleError::platform(SetupStep::Notify, e)));
                            break;
                        }
                        None => break,
                    }
                }
            }

            info!("Notification stream ended");
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(receiver_stream(rx)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BleError::NotificationsEnded),
        }
    }
}
