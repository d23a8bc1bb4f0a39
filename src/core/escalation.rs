//! Emergency escalation
//! Watches the safety status and, on every new heart-rate or fall alarm,
//! asks the wearer whether to call the emergency number.

use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::escalation_config::EscalationConfig;
use crate::core::ports::{AlertPrompter, CallError, Telephony};
use crate::core::safety::SafetyStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscalationError {
    #[error("Calling is not available on this device ({0})")]
    CapabilityUnavailable(String),
    #[error("Call failed: {0}")]
    CallFailed(#[from] CallError),
}

impl EscalationError {
    /// Title of the alert shown for this error
    pub fn alert_title(&self) -> String {
        match self {
            Self::CapabilityUnavailable(_) => "Calling is not available".to_string(),
            Self::CallFailed(e) => format!("Call error: {}", e.kind),
        }
    }

    /// Body of the alert shown for this error
    pub fn alert_message(&self) -> String {
        match self {
            Self::CapabilityUnavailable(number) => format!("Cannot place a call to {}.", number),
            Self::CallFailed(e) => e.message.clone(),
        }
    }
}

/// How one escalation prompt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationOutcome {
    /// The wearer confirmed and the call was placed
    Called,
    /// The wearer declined, or the prompt could not be shown
    Dismissed,
    /// The wearer confirmed but the call could not be placed
    Failed(EscalationError),
}

/// Snapshot of the coordinator's bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EscalationState {
    /// Last observed value of the escalation condition
    pub alarm_active: bool,
    /// A confirmation prompt is currently shown
    pub dialog_open: bool,
}

/// Clears the dialog flag when the prompt task ends, however it ends.
struct DialogGuard(Arc<watch::Sender<bool>>);

impl Drop for DialogGuard {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

pub struct EscalationCoordinator {
    config: Arc<EscalationConfig>,
    prompter: Arc<dyn AlertPrompter>,
    telephony: Arc<dyn Telephony>,
    alarm_active: bool,
    dialog_open: Arc<watch::Sender<bool>>,
}

impl EscalationCoordinator {
    pub fn new(
        config: EscalationConfig,
        prompter: Arc<dyn AlertPrompter>,
        telephony: Arc<dyn Telephony>,
    ) -> Self {
        let (dialog_open, _) = watch::channel(false);
        Self {
            config: Arc::new(config),
            prompter,
            telephony,
            alarm_active: false,
            dialog_open: Arc::new(dialog_open),
        }
    }

    pub fn state(&self) -> EscalationState {
        EscalationState {
            alarm_active: self.alarm_active,
            dialog_open: *self.dialog_open.borrow(),
        }
    }

    /// Receiver that follows whether a prompt is open
    pub fn dialog_open(&self) -> watch::Receiver<bool> {
        self.dialog_open.subscribe()
    }

    /// Feeds one status update. Returns the prompt task when this update is
    /// a rising edge of the alarm and no prompt is already open.
    pub fn observe(&mut self, status: &SafetyStatus) -> Option<JoinHandle<EscalationOutcome>> {
        let alarm = status.requires_escalation();
        let rising_edge = alarm && !self.alarm_active;
        self.alarm_active = alarm;

        if !rising_edge {
            return None;
        }

        if *self.dialog_open.borrow() {
            info!("Emergency prompt already open, not raising another one.");
            return None;
        }

        warn!(
            "Emergency condition detected (heart rate ok: {}, fall ok: {}), asking wearer.",
            status.heart_rate_ok, status.fall_ok
        );
        self.dialog_open.send_replace(true);
        let guard = DialogGuard(self.dialog_open.clone());

        let config = self.config.clone();
        let prompter = self.prompter.clone();
        let telephony = self.telephony.clone();

        Some(tokio::spawn(async move {
            let _guard = guard;
            Self::escalate(&config, prompter.as_ref(), telephony.as_ref()).await
        }))
    }

    async fn escalate(
        config: &EscalationConfig,
        prompter: &dyn AlertPrompter,
        telephony: &dyn Telephony,
    ) -> EscalationOutcome {
        let confirmed = match prompter.confirm(&config.prompt_title, &config.prompt_message).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Failed to show emergency prompt: {}", e);
                return EscalationOutcome::Dismissed;
            }
        };

        if !confirmed {
            info!("Wearer dismissed the emergency prompt.");
            return EscalationOutcome::Dismissed;
        }

        match Self::place_call(&config.emergency_number, telephony).await {
            Ok(()) => {
                info!("Emergency call to {} placed.", config.emergency_number);
                EscalationOutcome::Called
            }
            Err(e) => {
                warn!("Emergency call failed: {}", e);
                prompter.alert(&e.alert_title(), &e.alert_message()).await;
                EscalationOutcome::Failed(e)
            }
        }
    }

    async fn place_call(number: &str, telephony: &dyn Telephony) -> Result<(), EscalationError> {
        if !telephony.can_call(number).await {
            return Err(EscalationError::CapabilityUnavailable(number.to_string()));
        }
        telephony.call(number).await?;
        Ok(())
    }
}
