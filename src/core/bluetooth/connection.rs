//! Bluetooth connection handling for the safety band
//! This module handles connecting to the band, discovering its telemetry
//! service and releasing the link again.

use bluest::{Adapter, Characteristic, Device, Service};
use log::{info, warn};
use uuid::Uuid;

use crate::core::bluetooth::error::{BleError, SetupStep};

/// A live link to the band together with what has been discovered on it
pub struct BandConnection {
    pub device: Device,
    pub services: Vec<Service>,
}

/// Connection manager for the band
#[derive(Clone)]
pub struct ConnectionManager {
    adapter: Adapter,
}

impl ConnectionManager {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    pub async fn connect(&self, device: &Device) -> Result<BandConnection, BleError> {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Device details - ID: {}, Name: {:?}", device.id(), name);

        if !device.is_connected().await {
            info!("Initiating connection to {}...", device.id());
            self.adapter
                .connect_device(device)
                .await
                .map_err(|e| BleError::platform(SetupStep::Connect, e))?;
        }

        info!("Connection successful.");
        Ok(BandConnection {
            device: device.clone(),
            services: Vec::new(),
        })
    }

    pub async fn discover(&self, connection: &mut BandConnection, service_uuid: Uuid) -> Result<(), BleError> {
        info!("Discovering services...");
        let services = connection
            .device
            .discover_services_with_uuid(service_uuid)
            .await
            .map_err(|e| BleError::platform(SetupStep::Discover, e))?;

        if services.is_empty() {
            return Err(BleError::ServiceNotFound(service_uuid));
        }

        info!("Found telemetry service: {}", service_uuid);
        connection.services = services;
        Ok(())
    }

    pub async fn find_characteristic(
        &self,
        connection: &BandConnection,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<Characteristic, BleError> {
        let service = connection
            .services
            .iter()
            .find(|s| s.uuid() == service_uuid)
            .ok_or(BleError::ServiceNotFound(service_uuid))?;

        let characteristic = service
            .discover_characteristics_with_uuid(characteristic_uuid)
            .await
            .map_err(|e| BleError::platform(SetupStep::Subscribe, e))?
            .into_iter()
            .next()
            .ok_or(BleError::CharacteristicNotFound(characteristic_uuid))?;

        info!("Found notification characteristic: {}", characteristic_uuid);
        Ok(characteristic)
    }

    pub async fn disconnect(&self, connection: BandConnection) -> Result<(), BleError> {
        let device = connection.device;
        if device.is_connected().await {
            info!("Disconnecting from device {}", device.id());
            self.adapter
                .disconnect_device(&device)
                .await
                .map_err(|e| BleError::platform(SetupStep::Connect, e))?;
            info!("Successfully disconnected");
        } else {
            warn!("Device {} not connected", device.id());
        }
        Ok(())
    }
}
