//! Scriptable Bluetooth backend for integration tests.
//!
//! The adapter state, the scan result and each setup step are set by the
//! test; notifications are pushed by hand once a subscription exists.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use safety_band_monitor_lib::config::device_config::DeviceConfig;
use safety_band_monitor_lib::core::bluetooth::{
    AdapterState, AdapterStateStream, BleBackend, BleError, DiscoveredDevice, NotificationStream,
    ScanStream, SetupStep, receiver_stream,
};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const BAND_ID: &str = "/org/bluez/hci0/dev_AC_67_B2_3C_1F_0A";

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub id: String,
}

#[derive(Debug)]
pub struct MockConnection {
    pub id: String,
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum ScanBehavior {
    Finds(String),
    NoDevice,
    Fails(BleError),
    Never,
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum StepBehavior {
    Succeeds,
    Fails(BleError),
    Hangs,
}

impl StepBehavior {
    async fn run(&self) -> Result<(), BleError> {
        match self {
            Self::Succeeds => Ok(()),
            Self::Fails(e) => Err(e.clone()),
            Self::Hangs => futures_util::future::pending().await,
        }
    }
}

pub fn platform_error(step: SetupStep) -> BleError {
    BleError::Platform {
        step,
        kind: "NotReady".to_string(),
        message: "adapter is busy".to_string(),
    }
}

/// Short timeouts so hanging steps fail quickly.
pub fn fast_config() -> DeviceConfig {
    DeviceConfig {
        connect_timeout_secs: 1,
        discover_timeout_secs: 1,
        subscribe_timeout_secs: 1,
        ..Default::default()
    }
}

// ── MockBackend ───────────────────────────────────────────────

/// Adapter state subscription. Each new subscription opens a fresh channel
/// that starts with the last reported state.
struct AdapterFeed {
    tx: mpsc::UnboundedSender<AdapterState>,
    rx: Option<mpsc::UnboundedReceiver<AdapterState>>,
    last: Option<AdapterState>,
    available: bool,
}

impl AdapterFeed {
    fn reopen(&mut self) {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(state) = self.last {
            tx.send(state).unwrap();
        }
        self.tx = tx;
        self.rx = Some(rx);
    }
}

pub struct MockBackend {
    adapter: Mutex<AdapterFeed>,
    scan: Mutex<ScanBehavior>,
    connect: Mutex<StepBehavior>,
    discover: Mutex<StepBehavior>,
    subscribe: Mutex<StepBehavior>,
    notifications: Mutex<Option<mpsc::UnboundedSender<Result<Vec<u8>, BleError>>>>,
    pub scans: AtomicUsize,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            adapter: Mutex::new(AdapterFeed {
                tx,
                rx: Some(rx),
                last: None,
                available: true,
            }),
            scan: Mutex::new(ScanBehavior::Finds(BAND_ID.to_string())),
            connect: Mutex::new(StepBehavior::Succeeds),
            discover: Mutex::new(StepBehavior::Succeeds),
            subscribe: Mutex::new(StepBehavior::Succeeds),
            notifications: Mutex::new(None),
            scans: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn power(&self, state: AdapterState) {
        let mut feed = self.adapter.lock().unwrap();
        feed.last = Some(state);
        // A closed subscription picks the state up when it reopens.
        let _ = feed.tx.send(state);
    }

    /// Closes the current adapter state subscription.
    pub fn end_adapter_stream(&self) {
        self.adapter.lock().unwrap().reopen();
    }

    /// While unavailable, subscribing to adapter states fails.
    pub fn set_adapter_available(&self, available: bool) {
        self.adapter.lock().unwrap().available = available;
    }

    pub fn set_scan(&self, behavior: ScanBehavior) {
        *self.scan.lock().unwrap() = behavior;
    }

    pub fn set_connect(&self, behavior: StepBehavior) {
        *self.connect.lock().unwrap() = behavior;
    }

    pub fn set_discover(&self, behavior: StepBehavior) {
        *self.discover.lock().unwrap() = behavior;
    }

    pub fn set_subscribe(&self, behavior: StepBehavior) {
        *self.subscribe.lock().unwrap() = behavior;
    }

    /// A subscription exists and its consumer is still listening.
    pub fn is_subscribed(&self) -> bool {
        self.notifications
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Pushes one raw notification. Returns `false` without a subscriber.
    pub fn notify(&self, value: &[u8]) -> bool {
        self.notifications
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(value.to_vec())).is_ok())
    }

    pub fn fail_notifications(&self, error: BleError) {
        if let Some(tx) = self.notifications.lock().unwrap().take() {
            let _ = tx.send(Err(error));
        }
    }

    /// Ends the subscription as if the band went away.
    pub fn end_notifications(&self) {
        self.notifications.lock().unwrap().take();
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BleBackend for MockBackend {
    type Device = MockDevice;
    type Connection = MockConnection;

    async fn adapter_states(&self) -> Result<AdapterStateStream, BleError> {
        let mut feed = self.adapter.lock().unwrap();
        if !feed.available {
            return Err(BleError::NoAdapter);
        }
        if feed.rx.is_none() {
            feed.reopen();
        }
        let rx = feed.rx.take().ok_or(BleError::NoAdapter)?;
        Ok(receiver_stream(rx))
    }

    async fn start_scan(&self, _service: Uuid) -> Result<ScanStream<MockDevice>, BleError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let behavior = self.scan.lock().unwrap().clone();
        Ok(match behavior {
            ScanBehavior::Finds(id) => stream::iter(vec![Ok(Some(MockDevice { id }))]).boxed(),
            ScanBehavior::NoDevice => stream::iter(vec![Ok(None)]).boxed(),
            ScanBehavior::Fails(e) => stream::iter(vec![Err(e)]).boxed(),
            ScanBehavior::Never => stream::pending().boxed(),
        })
    }

    fn describe(&self, device: &MockDevice) -> DiscoveredDevice {
        DiscoveredDevice {
            id: device.id.clone(),
            name: Some("SafetyBand".to_string()),
            address: None,
        }
    }

    async fn connect(&self, device: &MockDevice) -> Result<MockConnection, BleError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let behavior = self.connect.lock().unwrap().clone();
        behavior.run().await?;
        Ok(MockConnection {
            id: device.id.clone(),
        })
    }

    async fn discover_services(
        &self,
        _connection: &mut MockConnection,
        _service: Uuid,
    ) -> Result<(), BleError> {
        let behavior = self.discover.lock().unwrap().clone();
        behavior.run().await
    }

    async fn monitor_characteristic(
        &self,
        _connection: &MockConnection,
        _service: Uuid,
        _characteristic: Uuid,
    ) -> Result<NotificationStream, BleError> {
        let behavior = self.subscribe.lock().unwrap().clone();
        behavior.run().await?;

        let (tx, rx) = mpsc::unbounded_channel();
        *self.notifications.lock().unwrap() = Some(tx);
        Ok(receiver_stream(rx))
    }

    async fn disconnect(&self, _connection: MockConnection) -> Result<(), BleError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Polls `condition` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
