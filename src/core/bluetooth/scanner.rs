use bluest::{Adapter, AdapterEvent, Device};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::backend::{AdapterStateStream, ScanStream, receiver_stream};
use crate::core::bluetooth::error::{BleError, SetupStep};
use crate::core::bluetooth::types::{AdapterState, DiscoveredDevice};

/// Adapter watching and device discovery on top of bluest.
///
/// bluest streams borrow the adapter, so each one is driven by a task that
/// owns an adapter clone and forwards into a channel. The task ends as soon
/// as the consumer drops the stream, which also stops the scan.
#[derive(Clone)]
pub struct BluetoothScanner {
    adapter: Adapter,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Current power state followed by every change.
    pub fn adapter_states(&self) -> AdapterStateStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let adapter = self.adapter.clone();

        tokio::spawn(async move {
            let initial = match adapter.is_available().await {
                Ok(true) => AdapterState::PoweredOn,
                Ok(false) => AdapterState::PoweredOff,
                Err(e) => {
                    warn!("Could not query adapter availability: {}", e);
                    AdapterState::Unknown
                }
            };
            if tx.send(initial).is_err() {
                return;
            }

            let mut events = match adapter.events().await {
                Ok(events) => events,
                Err(e) => {
                    error!("Failed to subscribe to adapter events: {}", e);
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    event = events.next() => {
                        let state = match event {
                            Some(Ok(AdapterEvent::Available)) => AdapterState::PoweredOn,
                            Some(Ok(AdapterEvent::Unavailable)) => AdapterState::PoweredOff,
                            Some(Err(e)) => {
                                error!("Error in adapter event stream: {}", e);
                                continue;
                            }
                            None => break,
                        };
                        if tx.send(state).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Adapter event stream closed.");
        });

        receiver_stream(rx)
    }

    /// Scans for devices advertising `service`. A band that is already
    /// connected to this host is reported first without scanning.
    pub fn scan(&self, service: Uuid) -> ScanStream<Device> {
        let (tx, rx) = mpsc::unbounded_channel();
        let adapter = self.adapter.clone();

        tokio::spawn(async move {
            let services = [service];

            info!("Checking for connected devices");
            match adapter.connected_devices_with_services(&services).await {
                Ok(connected) => {
                    if let Some(device) = connected.into_iter().next() {
                        info!("Safety band already connected: {}", device.id());
                        let _ = tx.send(Ok(Some(device)));
                        return;
                    }
                }
                Err(e) => debug!("Could not list connected devices: {}", e),
            }

            info!("Starting bluetooth scan for service {}", service);
            let mut scan_stream = match adapter.scan(&services).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(BleError::platform(SetupStep::Scan, e)));
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    result = scan_stream.next() => match result {
                        Some(discovered_device) => {
                            debug!(
                                "Found device - Device: {:?}, RSSI: {:?}",
                                discovered_device.device, discovered_device.rssi
                            );
                            if tx.send(Ok(Some(discovered_device.device))).is_err() {
                                break;
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
            }
            info!("Bluetooth scan stopped.");
        });

        receiver_stream(rx)
    }

    pub fn describe(device: &Device) -> DiscoveredDevice {
        let id = device.id().to_string();
        DiscoveredDevice {
            address: extract_mac_address(&id),
            name: device.name().ok(),
            id,
        }
    }
}

/// Pulls a MAC address out of a platform device id, if it carries one.
fn extract_mac_address(device_id_str: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:_-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().replace(['_', '-'], ":").to_uppercase())
}
