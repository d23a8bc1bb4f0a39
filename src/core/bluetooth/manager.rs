//! Bluetooth manager for the safety band
//! Owns the adapter subscription and the single scan → connect → discover →
//! subscribe cycle, and tracks where that cycle currently stands.
//!
//! The cycle itself runs on its own task and reports every step back as a
//! [`BleEvent`]. State only changes in [`BluetoothManager::handle_event`],
//! which the monitor calls from its event loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::device_config::DeviceConfig;
use crate::core::bluetooth::backend::BleBackend;
use crate::core::bluetooth::error::{BleError, SetupStep};
use crate::core::bluetooth::types::{
    AdapterState, BleStatus, ConnectionState, DiscoveredDevice, ScanState,
};

/// Something that happened on the Bluetooth side
#[derive(Debug, Clone, PartialEq)]
pub enum BleEvent {
    AdapterStateChanged(AdapterState),
    /// The adapter state subscription closed on its own
    AdapterWatchEnded,
    /// Progress of the setup cycle with the given id
    Cycle { id: u64, progress: CycleProgress },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleProgress {
    ScanStarted,
    DeviceFound(DiscoveredDevice),
    /// The scan produced no device handle
    NoDevice,
    Connected,
    ServicesDiscovered,
    Subscribed,
    Notification(Vec<u8>),
    Failed(BleError),
    /// The cycle's connection has been released and its task is done
    Released,
}

/// What the monitor has to act on after an event
#[derive(Debug, Clone, PartialEq)]
pub enum BleSignal {
    /// A raw notification value from the subscribed characteristic
    Payload(Vec<u8>),
    /// A step failed; the wearer should be told
    Failure(BleError),
}

enum CycleError {
    NoDevice,
    Ble(BleError),
}

impl From<BleError> for CycleError {
    fn from(e: BleError) -> Self {
        Self::Ble(e)
    }
}

struct SetupCycle {
    id: u64,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

struct CycleReporter {
    id: u64,
    events: mpsc::UnboundedSender<BleEvent>,
}

impl CycleReporter {
    fn send(&self, progress: CycleProgress) {
        // The receiver is gone only after the monitor stopped.
        let _ = self.events.send(BleEvent::Cycle { id: self.id, progress });
    }
}

/// Manages the connection to the safety band
pub struct BluetoothManager<B: BleBackend> {
    backend: Arc<B>,
    config: DeviceConfig,
    events: mpsc::UnboundedSender<BleEvent>,
    adapter_state: AdapterState,
    scan_state: ScanState,
    connection_state: ConnectionState,
    status: watch::Sender<BleStatus>,
    adapter_watch: Option<(CancellationToken, JoinHandle<()>)>,
    cycle: Option<SetupCycle>,
    // Cancelled cycles still releasing their connection
    retired: Vec<SetupCycle>,
    next_cycle_id: u64,
}

impl<B: BleBackend> BluetoothManager<B> {
    /// Creates a manager and the receiver its events arrive on.
    pub fn new(backend: Arc<B>, config: DeviceConfig) -> (Self, mpsc::UnboundedReceiver<BleEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(BleStatus::Off);
        let manager = Self {
            backend,
            config,
            events,
            adapter_state: AdapterState::Unknown,
            scan_state: ScanState::Idle,
            connection_state: ConnectionState::Disconnected,
            status,
            adapter_watch: None,
            cycle: None,
            retired: Vec::new(),
            next_cycle_id: 0,
        };
        (manager, rx)
    }

    pub fn adapter_state(&self) -> AdapterState {
        self.adapter_state
    }

    pub fn scan_state(&self) -> ScanState {
        self.scan_state
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn status(&self) -> BleStatus {
        *self.status.borrow()
    }

    /// Receiver that follows the display label
    pub fn status_receiver(&self) -> watch::Receiver<BleStatus> {
        self.status.subscribe()
    }

    /// A cycle task exists and has not released its connection yet
    pub fn is_cycle_active(&self) -> bool {
        self.cycle.is_some()
    }

    /// Subscribes to adapter power changes. No-op when already subscribed.
    ///
    /// On error the connection is marked failed so that [`retry`] can
    /// subscribe again.
    ///
    /// [`retry`]: BluetoothManager::retry
    pub async fn start(&mut self) -> Result<(), BleError> {
        if self.adapter_watch.is_some() {
            debug!("Adapter already watched.");
            return Ok(());
        }

        let mut states = match self.backend.adapter_states().await {
            Ok(states) => states,
            Err(e) => {
                error!("Could not watch the Bluetooth adapter: {}", e);
                self.adapter_state = AdapterState::Unknown;
                self.mark_failed();
                return Err(e);
            }
        };
        let cancel_token = CancellationToken::new();
        let cancel_token_for_task = cancel_token.clone();
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token_for_task.cancelled() => break,
                    state = states.next() => match state {
                        Some(state) => {
                            if events.send(BleEvent::AdapterStateChanged(state)).is_err() {
                                break;
                            }
                        }
                        None => {
                            warn!("Adapter state stream has ended.");
                            let _ = events.send(BleEvent::AdapterWatchEnded);
                            break;
                        }
                    },
                }
            }
        });

        self.adapter_watch = Some((cancel_token, handle));
        info!("Watching Bluetooth adapter state.");
        Ok(())
    }

    /// Applies one event and tells the caller what, if anything, to do next.
    pub fn handle_event(&mut self, event: BleEvent) -> Option<BleSignal> {
        match event {
            BleEvent::AdapterStateChanged(state) => {
                self.on_adapter_state(state);
                None
            }
            BleEvent::AdapterWatchEnded => self.on_adapter_watch_ended(),
            BleEvent::Cycle { id, progress } => {
                if self.cycle.as_ref().map(|c| c.id) != Some(id) {
                    debug!("Dropping event from finished cycle {}: {:?}", id, progress);
                    return None;
                }
                self.on_cycle_progress(progress)
            }
        }
    }

    /// Recovers from a failure. Subscribes to the adapter again if that
    /// subscription was lost, then starts a new cycle once the adapter is
    /// powered on.
    ///
    /// Returns `Ok(false)` when the connection has not failed, and the
    /// subscription error when the adapter still cannot be watched.
    pub async fn retry(&mut self) -> Result<bool, BleError> {
        if self.connection_state != ConnectionState::Failed {
            debug!("Retry ignored, connection state is {:?}.", self.connection_state);
            return Ok(false);
        }

        self.stop_cycle().await;
        self.scan_state = ScanState::Idle;
        info!("Retrying Bluetooth connection.");

        if self.adapter_watch.is_none() {
            self.start().await?;
            // The fresh subscription reports the current power state first.
            self.connection_state = ConnectionState::Disconnected;
            return Ok(true);
        }

        self.connection_state = ConnectionState::Disconnected;
        Ok(self.begin_cycle())
    }

    /// Cancels the adapter subscription, stops any scan and releases the
    /// connection. Safe to call repeatedly.
    pub async fn teardown(&mut self) {
        if let Some((cancel_token, handle)) = self.adapter_watch.take() {
            cancel_token.cancel();
            if let Err(e) = handle.await {
                error!("Adapter watch task finished with a join error: {:?}", e);
            }
            info!("Adapter subscription cancelled.");
        }

        self.stop_cycle().await;

        self.adapter_state = AdapterState::Unknown;
        self.scan_state = ScanState::Idle;
        self.connection_state = ConnectionState::Disconnected;
        self.set_status(BleStatus::Off);
    }

    fn on_adapter_state(&mut self, state: AdapterState) {
        let previous = std::mem::replace(&mut self.adapter_state, state);
        if previous == state {
            return;
        }
        info!("Bluetooth adapter state: {:?} -> {:?}", previous, state);

        match state {
            AdapterState::PoweredOn => {
                self.begin_cycle();
            }
            AdapterState::PoweredOff => {
                self.set_status(BleStatus::Off);
            }
            AdapterState::Unknown => {}
        }
    }

    fn on_adapter_watch_ended(&mut self) -> Option<BleSignal> {
        if self.adapter_watch.take().is_none() {
            return None;
        }
        if let Some(cycle) = self.cycle.take() {
            cycle.cancel_token.cancel();
            self.retired.push(cycle);
        }
        self.adapter_state = AdapterState::Unknown;
        self.mark_failed();
        let error = BleError::AdapterWatchEnded;
        error!("Bluetooth connection failed: {}", error);
        Some(BleSignal::Failure(error))
    }

    fn mark_failed(&mut self) {
        self.scan_state = ScanState::Idle;
        self.connection_state = ConnectionState::Failed;
        self.set_status(BleStatus::Off);
    }

    fn begin_cycle(&mut self) -> bool {
        if self.adapter_state != AdapterState::PoweredOn {
            debug!("Adapter not powered on, not scanning.");
            return false;
        }
        if self.cycle.is_some()
            || self.scan_state != ScanState::Idle
            || self.connection_state != ConnectionState::Disconnected
        {
            debug!(
                "Cycle not started (scan: {:?}, connection: {:?}).",
                self.scan_state, self.connection_state
            );
            return false;
        }

        let id = self.next_cycle_id;
        self.next_cycle_id += 1;

        let cancel_token = CancellationToken::new();
        let reporter = CycleReporter {
            id,
            events: self.events.clone(),
        };
        let handle = tokio::spawn(Self::run_cycle(
            self.backend.clone(),
            self.config.clone(),
            reporter,
            cancel_token.clone(),
        ));

        self.cycle = Some(SetupCycle {
            id,
            cancel_token,
            handle,
        });
        debug!("Setup cycle {} started.", id);
        true
    }

    fn on_cycle_progress(&mut self, progress: CycleProgress) -> Option<BleSignal> {
        match progress {
            CycleProgress::ScanStarted => {
                self.scan_state = ScanState::Scanning;
                self.set_status(BleStatus::Loading);
            }
            CycleProgress::DeviceFound(device) => {
                info!(
                    "Found safety band: ID: {}, Name: {:?}, Address: {:?}",
                    device.id, device.name, device.address
                );
                self.scan_state = ScanState::DeviceFound;
                self.connection_state = ConnectionState::Connecting;
                self.set_status(BleStatus::On);
            }
            CycleProgress::NoDevice => {
                warn!("Scan returned no device.");
                self.mark_failed();
            }
            CycleProgress::Connected => {
                self.connection_state = ConnectionState::ServiceDiscovery;
            }
            CycleProgress::ServicesDiscovered => {
                debug!("Services discovered, subscribing.");
            }
            CycleProgress::Subscribed => {
                info!("Subscribed to band telemetry.");
                self.connection_state = ConnectionState::Subscribed;
            }
            CycleProgress::Notification(value) => {
                if self.connection_state == ConnectionState::Subscribed {
                    return Some(BleSignal::Payload(value));
                }
                debug!("Dropping notification outside of a subscription.");
            }
            CycleProgress::Failed(e) => {
                error!("Bluetooth connection failed: {}", e);
                self.mark_failed();
                return Some(BleSignal::Failure(e));
            }
            CycleProgress::Released => {
                debug!("Setup cycle released its connection.");
                self.cycle = None;
            }
        }
        None
    }

    async fn stop_cycle(&mut self) {
        let mut cycles = std::mem::take(&mut self.retired);
        cycles.extend(self.cycle.take());
        for cycle in cycles {
            cycle.cancel_token.cancel();
            match cycle.handle.await {
                Ok(()) => info!("Setup cycle {} stopped.", cycle.id),
                Err(e) => error!("Setup cycle {} finished with a join error: {:?}", cycle.id, e),
            }
        }
    }

    fn set_status(&self, status: BleStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            info!("Bluetooth status: {}", status);
        }
    }

    async fn run_cycle(
        backend: Arc<B>,
        config: DeviceConfig,
        reporter: CycleReporter,
        cancel_token: CancellationToken,
    ) {
        let mut connection: Option<B::Connection> = None;

        let result = tokio::select! {
            _ = cancel_token.cancelled() => Ok(()),
            result = Self::setup_and_listen(backend.as_ref(), &config, &reporter, &mut connection) => result,
        };

        match result {
            Ok(()) => {}
            Err(CycleError::NoDevice) => reporter.send(CycleProgress::NoDevice),
            Err(CycleError::Ble(e)) => reporter.send(CycleProgress::Failed(e)),
        }

        if let Some(connection) = connection.take() {
            match backend.disconnect(connection).await {
                Ok(()) => info!("Connection released."),
                Err(e) => warn!("Failed to release connection: {}", e),
            }
        }
        reporter.send(CycleProgress::Released);
    }

    async fn setup_and_listen(
        backend: &B,
        config: &DeviceConfig,
        reporter: &CycleReporter,
        connection: &mut Option<B::Connection>,
    ) -> Result<(), CycleError> {
        reporter.send(CycleProgress::ScanStarted);
        info!("Scanning for safety band (service {}).", config.service_uuid);

        let device = {
            let mut scan = backend.start_scan(config.service_uuid).await?;
            let first = scan.next().await;
            // First match wins; dropping the stream stops the scan.
            drop(scan);
            match first {
                Some(Ok(Some(device))) => device,
                Some(Ok(None)) | None => return Err(CycleError::NoDevice),
                Some(Err(e)) => return Err(e.into()),
            }
        };
        reporter.send(CycleProgress::DeviceFound(backend.describe(&device)));

        let link = connection.insert(
            with_timeout(SetupStep::Connect, config.connect_timeout(), backend.connect(&device)).await?,
        );
        reporter.send(CycleProgress::Connected);

        with_timeout(
            SetupStep::Discover,
            config.discover_timeout(),
            backend.discover_services(link, config.service_uuid),
        )
        .await?;
        reporter.send(CycleProgress::ServicesDiscovered);

        let mut notifications = with_timeout(
            SetupStep::Subscribe,
            config.subscribe_timeout(),
            backend.monitor_characteristic(link, config.service_uuid, config.characteristic_uuid),
        )
        .await?;
        reporter.send(CycleProgress::Subscribed);

        while let Some(value) = notifications.next().await {
            reporter.send(CycleProgress::Notification(value?));
        }
        Err(BleError::NotificationsEnded.into())
    }
}

async fn with_timeout<T>(
    step: SetupStep,
    limit: Duration,
    operation: impl Future<Output = Result<T, BleError>>,
) -> Result<T, BleError> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| BleError::Timeout { step, after: limit })?
}
