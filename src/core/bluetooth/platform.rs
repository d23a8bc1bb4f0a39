use async_trait::async_trait;
use bluest::{Adapter, Device};
use log::info;
use uuid::Uuid;

use crate::core::bluetooth::backend::{AdapterStateStream, BleBackend, NotificationStream, ScanStream};
use crate::core::bluetooth::connection::{BandConnection, ConnectionManager};
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::types::DiscoveredDevice;

/// [`BleBackend`] on the host's default adapter, via bluest
pub struct BluestBackend {
    scanner: BluetoothScanner,
    connection_manager: ConnectionManager,
}

impl BluestBackend {
    pub async fn new() -> Result<Self, BleError> {
        let adapter = Adapter::default().await.ok_or(BleError::NoAdapter)?;
        info!("Bluetooth adapter found.");

        Ok(Self {
            scanner: BluetoothScanner::new(adapter.clone()),
            connection_manager: ConnectionManager::new(adapter),
        })
    }
}

#[async_trait]
impl BleBackend for BluestBackend {
    type Device = Device;
    type Connection = BandConnection;

    async fn adapter_states(&self) -> Result<AdapterStateStream, BleError> {
        Ok(self.scanner.adapter_states())
    }

    async fn start_scan(&self, service: Uuid) -> Result<ScanStream<Device>, BleError> {
        Ok(self.scanner.scan(service))
    }

    fn describe(&self, device: &Device) -> DiscoveredDevice {
        BluetoothScanner::describe(device)
    }

    async fn connect(&self, device: &Device) -> Result<BandConnection, BleError> {
        self.connection_manager.connect(device).await
    }

    async fn discover_services(&self, connection: &mut BandConnection, service: Uuid) -> Result<(), BleError> {
        self.connection_manager.discover(connection, service).await
    }

    async fn monitor_characteristic(
        &self,
        connection: &BandConnection,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream, BleError> {
        let notify_char = self
            .connection_manager
            .find_characteristic(connection, service, characteristic)
            .await?;
        NotificationHandler::subscribe(notify_char).await
    }

    async fn disconnect(&self, connection: BandConnection) -> Result<(), BleError> {
        self.connection_manager.disconnect(connection).await
    }
}
