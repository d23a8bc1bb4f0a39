//! Safety monitor
//! The single event loop that ties the band to the wearer's session: it
//! drives the Bluetooth manager, decodes telemetry, keeps the safety status,
//! persists temperature changes and hands alarms to escalation.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::bluetooth::{BleBackend, BleEvent, BleSignal, BleStatus, BluetoothManager};
use crate::core::escalation::{EscalationCoordinator, EscalationOutcome};
use crate::core::ports::{AlertPrompter, Collaborators, UserSession};
use crate::core::safety::{SafetyAggregator, SafetyStatus};
use crate::core::telemetry;
use crate::core::writer::StoreWriter;

/// Requests accepted by a running monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCommand {
    /// Start a new Bluetooth cycle after a failure
    RetryBluetooth,
}

pub struct Monitor<B: BleBackend> {
    session: UserSession,
    bluetooth: BluetoothManager<B>,
    ble_events: mpsc::UnboundedReceiver<BleEvent>,
    aggregator: SafetyAggregator,
    escalation: EscalationCoordinator,
    writer: StoreWriter,
    prompter: Arc<dyn AlertPrompter>,
    safety: watch::Sender<SafetyStatus>,
    last_payload: watch::Sender<Option<Vec<u8>>>,
    prompt: Option<JoinHandle<EscalationOutcome>>,
    alerts: Vec<JoinHandle<()>>,
}

impl<B: BleBackend> Monitor<B> {
    pub fn new(
        session: UserSession,
        backend: Arc<B>,
        config: &AppConfig,
        collaborators: &Collaborators,
    ) -> Self {
        let (bluetooth, ble_events) = BluetoothManager::new(backend, config.device.clone());
        let escalation = EscalationCoordinator::new(
            config.escalation.clone(),
            collaborators.prompter.clone(),
            collaborators.telephony.clone(),
        );
        let (safety, _) = watch::channel(SafetyStatus::default());
        let (last_payload, _) = watch::channel(None);
        let writer = StoreWriter::spawn(collaborators.store.clone(), session.user_id.clone());

        Self {
            session,
            bluetooth,
            ble_events,
            aggregator: SafetyAggregator::new(),
            escalation,
            writer,
            prompter: collaborators.prompter.clone(),
            safety,
            last_payload,
            prompt: None,
            alerts: Vec::new(),
        }
    }

    /// Moves the monitor onto its own task.
    pub fn spawn(self) -> MonitorHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let safety = self.safety.subscribe();
        let ble_status = self.bluetooth.status_receiver();
        let dialog_open = self.escalation.dialog_open();
        let last_payload = self.last_payload.subscribe();

        let task = tokio::spawn(self.run(commands_rx, shutdown.clone()));
        MonitorHandle {
            commands,
            shutdown,
            task: Some(task),
            safety,
            ble_status,
            dialog_open,
            last_payload,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<MonitorCommand>,
        shutdown: CancellationToken,
    ) {
        info!("Monitoring safety band for user {}.", self.session.user_id);
        self.push_temperature(self.aggregator.status().temperature_ok);

        if let Err(e) = self.bluetooth.start().await {
            self.show_alert(e.alert_title(), e.to_string());
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(command) = commands.recv() => self.handle_command(command).await,
                Some(event) = self.ble_events.recv() => self.handle_ble_event(event),
            }
        }

        self.teardown().await;
        info!("Monitor for user {} stopped.", self.session.user_id);
    }

    async fn handle_command(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::RetryBluetooth => match self.bluetooth.retry().await {
                Ok(true) => {}
                Ok(false) => info!("Bluetooth retry requested but nothing was restarted."),
                Err(e) => self.show_alert(e.alert_title(), e.to_string()),
            },
        }
    }

    fn handle_ble_event(&mut self, event: BleEvent) {
        match self.bluetooth.handle_event(event) {
            Some(BleSignal::Payload(raw)) => self.handle_payload(raw),
            Some(BleSignal::Failure(e)) => self.show_alert(e.alert_title(), e.to_string()),
            None => {}
        }
    }

    fn handle_payload(&mut self, raw: Vec<u8>) {
        self.last_payload.send_replace(Some(raw.clone()));

        let frame = match telemetry::decode(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Dropping telemetry payload {:?}: {}", raw, e);
                return;
            }
        };

        let update = self.aggregator.update(frame);
        if update.temperature_changed {
            self.push_temperature(update.status.temperature_ok);
        }
        self.safety.send_replace(update.status);

        if let Some(prompt) = self.escalation.observe(&update.status) {
            self.prompt = Some(prompt);
        }
    }

    fn push_temperature(&self, is_safe: bool) {
        self.writer.status(is_safe);
    }

    fn show_alert(&mut self, title: String, message: String) {
        self.alerts.retain(|alert| !alert.is_finished());
        let prompter = self.prompter.clone();
        self.alerts.push(tokio::spawn(async move {
            prompter.alert(&title, &message).await;
        }));
    }

    async fn teardown(&mut self) {
        self.bluetooth.teardown().await;
        if let Some(prompt) = self.prompt.take() {
            if !prompt.is_finished() {
                warn!("Closing the open emergency prompt.");
            }
            prompt.abort();
        }
        for alert in self.alerts.drain(..) {
            alert.abort();
        }
    }
}

/// Handle to a spawned [`Monitor`]. Dropping it stops the monitor.
pub struct MonitorHandle {
    commands: mpsc::UnboundedSender<MonitorCommand>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    safety: watch::Receiver<SafetyStatus>,
    ble_status: watch::Receiver<BleStatus>,
    dialog_open: watch::Receiver<bool>,
    last_payload: watch::Receiver<Option<Vec<u8>>>,
}

impl MonitorHandle {
    pub fn safety(&self) -> watch::Receiver<SafetyStatus> {
        self.safety.clone()
    }

    pub fn ble_status(&self) -> watch::Receiver<BleStatus> {
        self.ble_status.clone()
    }

    pub fn dialog_open(&self) -> watch::Receiver<bool> {
        self.dialog_open.clone()
    }

    /// Most recent raw notification, before validation
    pub fn last_payload(&self) -> watch::Receiver<Option<Vec<u8>>> {
        self.last_payload.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Asks the monitor to retry a failed Bluetooth connection.
    pub fn retry_bluetooth(&self) -> bool {
        self.commands.send(MonitorCommand::RetryBluetooth).is_ok()
    }

    /// Stops the monitor and waits until the band is released.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Monitor task finished with a join error: {:?}", e);
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
