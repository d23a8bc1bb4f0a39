use serde::{Deserialize, Serialize};

/// Emergency escalation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Number dialled when the wearer confirms an emergency
    pub emergency_number: String,
    /// Title of the confirmation prompt
    pub prompt_title: String,
    /// Body of the confirmation prompt
    pub prompt_message: String,
    /// Program that places the call. Empty disables calling.
    pub dial_program: String,
    /// Arguments for `dial_program`; `{uri}` is replaced with `tel:<number>`.
    pub dial_args: Vec<String>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        EscalationConfig {
            emergency_number: "119".to_string(),
            prompt_title: "Are you in an emergency?".to_string(),
            prompt_message: "If this is an emergency, please place a call.".to_string(),
            dial_program: "xdg-open".to_string(),
            dial_args: vec!["{uri}".to_string()],
        }
    }
}
