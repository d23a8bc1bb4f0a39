//! Integration tests for a whole session: band → monitor → store,
//! prompter and telephony, plus location streaming.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use safety_band_monitor_lib::config::AppConfig;
use safety_band_monitor_lib::core::bluetooth::{AdapterState, BleStatus, SetupStep};
use safety_band_monitor_lib::core::ports::{
    Accuracy, LocationSample, PermissionStatus, UserSession,
};
use safety_band_monitor_lib::state::AppState;
use tokio::sync::watch;

use crate::mock_ble::{MockBackend, ScanBehavior, fast_config, platform_error, wait_until};
use crate::mock_ports::{FakePhone, Ports, RecordingPrompter, RecordingStore, ScriptedLocation};

const USER: &str = "wearer-1";

fn config() -> AppConfig {
    AppConfig {
        device: fast_config(),
        ..Default::default()
    }
}

fn start(backend: &Arc<MockBackend>, ports: &Ports) -> AppState {
    AppState::start(
        UserSession::new(USER),
        &config(),
        backend.clone(),
        ports.collaborators(),
    )
}

async fn connected(backend: &Arc<MockBackend>, ports: &Ports) -> AppState {
    let state = start(backend, ports);
    backend.power(AdapterState::PoweredOn);
    let status = state.ble_status();
    wait_until(|| backend.is_subscribed() && *status.borrow() == BleStatus::On).await;
    state
}

/// Pushes one frame and waits until the monitor has processed it.
async fn send_frame(backend: &MockBackend, payload: &mut watch::Receiver<Option<Vec<u8>>>, frame: [u8; 3]) {
    payload.borrow_and_update();
    assert!(backend.notify(&frame), "band is not subscribed");
    tokio::time::timeout(Duration::from_secs(5), payload.changed())
        .await
        .expect("frame not processed in time")
        .expect("monitor stopped");
    assert_eq!(payload.borrow().as_deref(), Some(&frame[..]));
}

async fn prompt_closed(state: &AppState) {
    let dialog = state.dialog_open();
    wait_until(|| !*dialog.borrow()).await;
}

// ── End to end ────────────────────────────────────────────────

#[tokio::test]
async fn alarms_prompt_once_per_rising_edge() {
    let backend = Arc::new(MockBackend::new());
    let ports = Ports::new();
    let mut state = connected(&backend, &ports).await;
    let mut payload = state.last_payload();
    let safety = state.safety();
    let prompter = ports.prompter.clone();

    send_frame(&backend, &mut payload, [1, 1, 1]).await;
    assert!(safety.borrow().is_safe());

    send_frame(&backend, &mut payload, [1, 0, 1]).await;
    assert!(!safety.borrow().is_safe());
    wait_until(|| prompter.prompt_count() == 1).await;
    prompt_closed(&state).await;

    send_frame(&backend, &mut payload, [1, 0, 1]).await;
    send_frame(&backend, &mut payload, [1, 1, 1]).await;
    assert!(safety.borrow().is_safe());
    assert_eq!(prompter.prompt_count(), 1);

    send_frame(&backend, &mut payload, [1, 0, 0]).await;
    wait_until(|| prompter.prompt_count() == 2).await;
    prompt_closed(&state).await;

    assert_eq!(prompter.prompts.lock().unwrap()[0], "Are you in an emergency?");
    assert!(ports.phone.calls().is_empty(), "every prompt was dismissed");
    // Only the initial optimistic push; temperature never changed.
    assert_eq!(ports.store.statuses(), vec![true]);

    state.shutdown().await;
}

#[tokio::test]
async fn confirmed_alarm_calls_the_emergency_number() {
    let backend = Arc::new(MockBackend::new());
    let ports = Ports::with(
        RecordingPrompter::answering(true),
        FakePhone::new(true),
        ScriptedLocation::new(PermissionStatus::Denied, Vec::new()),
    );
    let mut state = connected(&backend, &ports).await;
    let mut payload = state.last_payload();

    send_frame(&backend, &mut payload, [1, 1, 0]).await;
    let phone = ports.phone.clone();
    wait_until(|| phone.calls() == vec!["119".to_string()]).await;
    prompt_closed(&state).await;
    assert!(ports.prompter.alerts.lock().unwrap().is_empty());

    state.shutdown().await;
}

#[tokio::test]
async fn missing_call_capability_is_reported() {
    let backend = Arc::new(MockBackend::new());
    let ports = Ports::with(
        RecordingPrompter::answering(true),
        FakePhone::new(false),
        ScriptedLocation::new(PermissionStatus::Denied, Vec::new()),
    );
    let mut state = connected(&backend, &ports).await;
    let mut payload = state.last_payload();

    send_frame(&backend, &mut payload, [1, 0, 1]).await;
    let prompter = ports.prompter.clone();
    wait_until(|| prompter.alert_titles() == vec!["Calling is not available".to_string()]).await;
    assert!(ports.phone.calls().is_empty());

    state.shutdown().await;
}

#[tokio::test]
async fn temperature_changes_are_persisted_without_prompting() {
    let backend = Arc::new(MockBackend::new());
    let ports = Ports::new();
    let mut state = connected(&backend, &ports).await;
    let mut payload = state.last_payload();

    send_frame(&backend, &mut payload, [0, 1, 1]).await;
    send_frame(&backend, &mut payload, [0, 1, 1]).await;
    send_frame(&backend, &mut payload, [1, 1, 1]).await;

    let store = ports.store.clone();
    wait_until(|| store.statuses().len() == 3).await;
    assert_eq!(store.statuses(), vec![true, false, true]);
    assert!(
        store.statuses.lock().unwrap().iter().all(|(user, _)| user == USER),
        "updates go to the session's user"
    );
    assert_eq!(ports.prompter.prompt_count(), 0);

    state.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_status_writes_keep_their_order() {
    let backend = Arc::new(MockBackend::new());
    let mut ports = Ports::new();
    ports.store = Arc::new(RecordingStore::slow_when_unsafe(Duration::from_millis(100)));
    let mut state = connected(&backend, &ports).await;
    let mut payload = state.last_payload();

    send_frame(&backend, &mut payload, [0, 1, 1]).await;
    send_frame(&backend, &mut payload, [1, 1, 1]).await;
    assert!(state.safety().borrow().temperature_ok);

    let store = ports.store.clone();
    wait_until(|| store.statuses().len() == 3).await;
    assert_eq!(store.statuses(), vec![true, false, true]);

    state.shutdown().await;
}

#[tokio::test]
async fn malformed_frames_are_dropped() {
    let backend = Arc::new(MockBackend::new());
    let ports = Ports::new();
    let mut state = connected(&backend, &ports).await;
    let mut payload = state.last_payload();
    let safety = state.safety();

    send_frame(&backend, &mut payload, [1, 0, 1]).await;
    wait_until(|| ports.prompter.prompt_count() == 1).await;

    payload.borrow_and_update();
    assert!(backend.notify(&[0, 0]));
    tokio::time::timeout(Duration::from_secs(5), payload.changed())
        .await
        .unwrap()
        .unwrap();

    // The short frame is visible as the raw readout but changes nothing.
    assert_eq!(payload.borrow().as_deref(), Some(&[0u8, 0][..]));
    assert!(!safety.borrow().heart_rate_ok);
    assert!(safety.borrow().temperature_ok);

    state.shutdown().await;
}

// ── Bluetooth failures ────────────────────────────────────────

#[tokio::test]
async fn bluetooth_failure_alerts_and_retry_recovers() {
    let backend = Arc::new(MockBackend::new());
    backend.set_scan(ScanBehavior::Fails(platform_error(SetupStep::Scan)));
    let ports = Ports::new();
    let mut state = start(&backend, &ports);

    backend.power(AdapterState::PoweredOn);
    let prompter = ports.prompter.clone();
    wait_until(|| prompter.alert_titles() == vec!["Bluetooth connection error NotReady".to_string()])
        .await;
    assert_eq!(*state.ble_status().borrow(), BleStatus::Off);

    backend.set_scan(ScanBehavior::Finds(crate::mock_ble::BAND_ID.to_string()));
    assert!(state.retry_bluetooth());
    let status = state.ble_status();
    wait_until(|| backend.is_subscribed() && *status.borrow() == BleStatus::On).await;
    assert_eq!(backend.scans(), 2);

    state.shutdown().await;
}

#[tokio::test]
async fn missing_adapter_alerts_and_retry_recovers() {
    let backend = Arc::new(MockBackend::new());
    backend.set_adapter_available(false);
    let ports = Ports::new();
    let mut state = start(&backend, &ports);

    let prompter = ports.prompter.clone();
    wait_until(|| prompter.alert_titles() == vec!["Bluetooth connection error NoAdapter".to_string()])
        .await;
    assert_eq!(*state.ble_status().borrow(), BleStatus::Off);

    backend.set_adapter_available(true);
    backend.power(AdapterState::PoweredOn);
    assert!(state.retry_bluetooth());
    let status = state.ble_status();
    wait_until(|| backend.is_subscribed() && *status.borrow() == BleStatus::On).await;
    assert_eq!(prompter.alert_titles().len(), 1);

    state.shutdown().await;
}

#[tokio::test]
async fn missing_band_shows_off_without_alert() {
    let backend = Arc::new(MockBackend::new());
    backend.set_scan(ScanBehavior::NoDevice);
    let ports = Ports::new();
    let mut state = start(&backend, &ports);
    let mut status = state.ble_status();

    backend.power(AdapterState::PoweredOn);
    // Loading first, then back to off once the scan comes up empty.
    wait_until(|| backend.scans() == 1).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            status.changed().await.unwrap();
            if *status.borrow_and_update() == BleStatus::Off {
                break;
            }
        }
    })
    .await
    .expect("label never went back to off");

    assert!(ports.prompter.alert_titles().is_empty());
    state.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_pending_alerts() {
    let backend = Arc::new(MockBackend::new());
    backend.set_adapter_available(false);
    let ports = Ports::with(
        RecordingPrompter::with_stuck_alerts(),
        FakePhone::new(true),
        ScriptedLocation::new(PermissionStatus::Denied, Vec::new()),
    );
    let mut state = start(&backend, &ports);

    let prompter = ports.prompter.clone();
    wait_until(|| prompter.open_alerts() == 1).await;

    state.shutdown().await;
    wait_until(|| prompter.open_alerts() == 0).await;
}

// ── Location ──────────────────────────────────────────────────

#[tokio::test]
async fn granted_location_is_streamed_to_the_store() {
    let backend = Arc::new(MockBackend::new());
    let sample = |latitude, longitude| LocationSample {
        latitude,
        longitude,
        timestamp: Utc::now(),
    };
    let ports = Ports::with(
        RecordingPrompter::answering(false),
        FakePhone::new(true),
        ScriptedLocation::new(
            PermissionStatus::Granted,
            vec![sample(37.5665, 126.978), sample(37.567, 126.978)],
        ),
    );
    let mut state = start(&backend, &ports);

    let store = ports.store.clone();
    wait_until(|| store.positions().len() == 2).await;
    assert_eq!(store.positions(), vec![(37.5665, 126.978), (37.567, 126.978)]);

    let options = ports.location.watched_with().expect("watch options");
    assert_eq!(options.accuracy, Accuracy::Highest);
    assert_eq!(options.min_interval_ms, 1000);
    assert_eq!(options.min_distance_m, 1.0);
    assert!(state.is_streaming_location());

    state.shutdown().await;
    assert!(!state.is_streaming_location());
}

#[tokio::test]
async fn denied_location_streams_nothing() {
    let backend = Arc::new(MockBackend::new());
    let ports = Ports::new();
    let mut state = start(&backend, &ports);

    wait_until(|| !state.is_streaming_location()).await;
    assert_eq!(ports.location.watched_with(), None);
    assert!(ports.store.positions().is_empty());

    state.shutdown().await;
}

// ── Shutdown ──────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_releases_the_band_and_is_idempotent() {
    let backend = Arc::new(MockBackend::new());
    let ports = Ports::new();
    let mut state = connected(&backend, &ports).await;
    let status = state.ble_status();

    state.shutdown().await;
    assert_eq!(backend.disconnects(), 1);
    assert!(!backend.is_subscribed());
    assert_eq!(*status.borrow(), BleStatus::Off);

    state.shutdown().await;
    assert_eq!(backend.disconnects(), 1);
}
