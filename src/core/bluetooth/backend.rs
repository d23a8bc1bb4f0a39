//! Backend abstraction for the Bluetooth stack
//! The connection state machine drives any implementation of [`BleBackend`];
//! [`BluestBackend`](super::BluestBackend) is the one used on real hardware.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::types::{AdapterState, DiscoveredDevice};

/// Adapter power notifications, starting with the current state
pub type AdapterStateStream = BoxStream<'static, AdapterState>;

/// Scan results. `Ok(None)` is a result without a device handle.
/// Dropping the stream stops the scan.
pub type ScanStream<D> = BoxStream<'static, Result<Option<D>, BleError>>;

/// Raw characteristic values. Dropping the stream unsubscribes.
pub type NotificationStream = BoxStream<'static, Result<Vec<u8>, BleError>>;

/// Operations the state machine needs from a Bluetooth stack.
///
/// Dropping the backend releases the adapter.
#[async_trait]
pub trait BleBackend: Send + Sync + 'static {
    /// Handle of a discovered peripheral
    type Device: Send + Sync + 'static;
    /// A live link to a peripheral
    type Connection: Send + Sync + 'static;

    async fn adapter_states(&self) -> Result<AdapterStateStream, BleError>;

    /// Starts discovery filtered to `service`.
    async fn start_scan(&self, service: Uuid) -> Result<ScanStream<Self::Device>, BleError>;

    /// Describes a device for logging and display.
    fn describe(&self, device: &Self::Device) -> DiscoveredDevice;

    async fn connect(&self, device: &Self::Device) -> Result<Self::Connection, BleError>;

    async fn discover_services(
        &self,
        connection: &mut Self::Connection,
        service: Uuid,
    ) -> Result<(), BleError>;

    async fn monitor_characteristic(
        &self,
        connection: &Self::Connection,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream, BleError>;

    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BleError>;
}

/// Turns a channel receiver into a boxed stream that ends when every sender
/// is gone.
pub fn receiver_stream<T: Send + 'static>(rx: mpsc::UnboundedReceiver<T>) -> BoxStream<'static, T> {
    futures_util::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
        .boxed()
}
